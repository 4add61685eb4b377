use super::*;

#[test]
fn status_codes_follow_the_taxonomy() {
    assert_eq!(
        status_for(&BatError::validation("$.frame", "must be an integer")),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(status_for(&BatError::schema("not json")), StatusCode::BAD_REQUEST);
    assert_eq!(
        status_for(&BatError::not_found("object", "Missing")),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_for(&BatError::capacity("class id", 3)),
        StatusCode::CONFLICT
    );
    assert_eq!(
        status_for(&BatError::Other(anyhow::anyhow!("boom"))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn error_reply_shape() {
    let err = BatError::validation("$.camera.fx", "must be > 0");
    let body = ErrorReply::new(err.kind(), err.to_string());
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"], "ValidationError");
    assert_eq!(
        json["message"],
        "validation error: $.camera.fx: must be > 0"
    );
}

#[test]
fn ack_omits_empty_ignored_list() {
    let ack = Ack {
        status: STATUS_SUCCESS.to_string(),
        message: "queued".to_string(),
        queued: 1,
        ignored: vec![],
    };
    let json = serde_json::to_string(&ack).unwrap();
    assert_eq!(json, r#"{"status":"success","message":"queued","queued":1}"#);
}

#[test]
fn api_error_carries_status() {
    let resp = ApiError(BatError::not_found("object", "Missing")).into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
