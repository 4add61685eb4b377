use crate::foundation::error::{BatError, BatResult};

/// Pinhole intrinsics plus Brown–Conrady distortion coefficients, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraIntrinsics {
    /// Sensor width in millimeters.
    pub sensor_width: f64,
    /// Focal length along x, in pixels.
    pub fx: f64,
    /// Focal length along y, in pixels.
    pub fy: f64,
    /// Principal point x, in pixels.
    pub cx: f64,
    /// Principal point y, in pixels.
    pub cy: f64,
    /// First tangential coefficient.
    pub p1: f64,
    /// Second tangential coefficient.
    pub p2: f64,
    /// Radial coefficient (r²).
    pub k1: f64,
    /// Radial coefficient (r⁴).
    pub k2: f64,
    /// Radial coefficient (r⁶).
    pub k3: f64,
    /// Radial coefficient (r⁸).
    pub k4: f64,
    /// Supersampling factor the host renders with before distortion.
    pub upscale_factor: f64,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            sensor_width: 36.0,
            fx: 1000.0,
            fy: 1000.0,
            cx: 960.0,
            cy: 540.0,
            p1: 0.0,
            p2: 0.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            k4: 0.0,
            upscale_factor: 1.0,
        }
    }
}

impl CameraIntrinsics {
    /// Wire names of every field, in application order.
    pub const FIELD_NAMES: [&'static str; 12] = [
        "sensor_width",
        "fx",
        "fy",
        "cx",
        "cy",
        "p1",
        "p2",
        "k1",
        "k2",
        "k3",
        "k4",
        "upscale_factor",
    ];

    fn fields_mut(&mut self) -> [(&'static str, &mut f64); 12] {
        [
            ("sensor_width", &mut self.sensor_width),
            ("fx", &mut self.fx),
            ("fy", &mut self.fy),
            ("cx", &mut self.cx),
            ("cy", &mut self.cy),
            ("p1", &mut self.p1),
            ("p2", &mut self.p2),
            ("k1", &mut self.k1),
            ("k2", &mut self.k2),
            ("k3", &mut self.k3),
            ("k4", &mut self.k4),
            ("upscale_factor", &mut self.upscale_factor),
        ]
    }

    /// Map a wire key to its canonical field name (`px`/`py` are accepted for `cx`/`cy`).
    pub fn canonical_field(key: &str) -> Option<&'static str> {
        match key {
            "px" => Some("cx"),
            "py" => Some("cy"),
            _ => Self::FIELD_NAMES.iter().copied().find(|n| *n == key),
        }
    }

    /// Check one field value. Returns the reason on failure.
    pub fn check_field(name: &str, value: f64) -> Result<(), &'static str> {
        if !value.is_finite() {
            return Err("must be a finite number");
        }
        match name {
            "sensor_width" | "fx" | "fy" | "upscale_factor" if value <= 0.0 => Err("must be > 0"),
            _ => Ok(()),
        }
    }

    /// Whether any distortion coefficient is non-zero.
    pub fn has_distortion(&self) -> bool {
        [self.p1, self.p2, self.k1, self.k2, self.k3, self.k4]
            .iter()
            .any(|c| *c != 0.0)
    }

    /// Focal length in millimeters for a render `resolution_x` pixels wide.
    pub fn focal_length_mm(&self, resolution_x: u32) -> f64 {
        self.fx / f64::from(resolution_x.max(1)) * self.sensor_width
    }

    /// Import an OpenCV-style calibration file.
    ///
    /// Accepts an object with optional `cam_mtx` (3x3 camera matrix) and `dist`
    /// (`[k1, k2, p1, p2, k3, k4]`). On error nothing is changed.
    pub fn apply_calibration_json(&mut self, text: &str) -> BatResult<()> {
        let root: serde_json::Value =
            serde_json::from_str(text).map_err(|e| BatError::schema(e.to_string()))?;
        let obj = root
            .as_object()
            .ok_or_else(|| BatError::schema("calibration file must contain an object"))?;

        let mut next = *self;
        if let Some(mtx) = obj.get("cam_mtx") {
            let m = matrix3(mtx).ok_or_else(|| {
                BatError::validation("$.cam_mtx", "must be a 3x3 matrix of numbers")
            })?;
            next.fx = m[0][0];
            next.fy = m[1][1];
            next.cx = m[0][2];
            next.cy = m[1][2];
        }
        if let Some(dist) = obj.get("dist") {
            let d = numbers::<6>(dist).ok_or_else(|| {
                BatError::validation("$.dist", "must be six numbers (k1, k2, p1, p2, k3, k4)")
            })?;
            next.k1 = d[0];
            next.k2 = d[1];
            next.p1 = d[2];
            next.p2 = d[3];
            next.k3 = d[4];
            next.k4 = d[5];
        }
        for (name, value) in next.fields_mut() {
            if let Err(msg) = Self::check_field(name, *value) {
                return Err(BatError::validation(format!("$.{name}"), msg));
            }
        }
        *self = next;
        Ok(())
    }
}

/// Partial camera update: only present fields change.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraPatch {
    values: [Option<f64>; 12],
}

impl CameraPatch {
    /// Set one field by canonical name. Returns false for unknown names.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match CameraIntrinsics::FIELD_NAMES.iter().position(|n| *n == name) {
            Some(i) => {
                self.values[i] = Some(value);
                true
            }
            None => false,
        }
    }

    /// Value of one field, if present.
    pub fn get(&self, name: &str) -> Option<f64> {
        CameraIntrinsics::FIELD_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values[i])
    }

    /// Whether no field is present.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Present fields in application order.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        CameraIntrinsics::FIELD_NAMES
            .iter()
            .zip(self.values.iter())
            .filter_map(|(name, v)| v.map(|v| (*name, v)))
    }

    /// Write present fields into `camera`; returns the names that were written.
    pub fn apply_to(&self, camera: &mut CameraIntrinsics) -> Vec<&'static str> {
        let mut changed = Vec::new();
        for ((name, slot), value) in camera.fields_mut().into_iter().zip(self.values.iter()) {
            if let Some(v) = value {
                *slot = *v;
                changed.push(name);
            }
        }
        changed
    }
}

fn numbers<const N: usize>(v: &serde_json::Value) -> Option<[f64; N]> {
    let arr = v.as_array()?;
    if arr.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = item.as_f64()?;
    }
    Some(out)
}

fn matrix3(v: &serde_json::Value) -> Option<[[f64; 3]; 3]> {
    let rows = v.as_array()?;
    if rows.len() != 3 {
        return None;
    }
    let mut out = [[0.0; 3]; 3];
    for (slot, row) in out.iter_mut().zip(rows) {
        *slot = numbers::<3>(row)?;
    }
    Some(out)
}

#[cfg(test)]
#[path = "../../tests/unit/camera/intrinsics.rs"]
mod tests;
