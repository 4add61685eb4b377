//! Host-tick session tying the registry, encoder, sink and command queue together.

pub mod annotation_session;
