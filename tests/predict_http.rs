// 该文件是 Kanxiang （看相） 项目的一部分。
// tests/predict_http.rs - 预测客户端集成测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod support;

use std::{sync::Arc, time::Duration};

use image::RgbImage;
use kanxiang::{
  FromUrl,
  frame::{FrameSnapshot, ImagePayload},
  geometry::BoundingBox,
  predict::{
    HttpPredictor, Origin, PredictFailure, PredictionCell, PredictionState, Predictor,
    spawn_prediction,
  },
  status::StatusLine,
};

use support::{FACE, Reply, StubEndpoint, closed_endpoint};

fn predictor(endpoint: &url::Url) -> Arc<dyn Predictor> {
  Arc::new(HttpPredictor::from_url(endpoint).unwrap())
}

fn frame_payload() -> ImagePayload {
  FrameSnapshot::encode(&RgbImage::new(32, 24), 80)
    .unwrap()
    .into_payload()
}

fn named_payload(name: &str) -> ImagePayload {
  ImagePayload {
    bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
    filename: name.to_string(),
    mime: "image/jpeg".to_string(),
  }
}

#[test]
fn posts_one_multipart_file_field() {
  let stub = StubEndpoint::serve(|_| Reply::ok(FACE));
  let payload = frame_payload();

  let result = predictor(&stub.url).submit(&payload).unwrap();
  assert_eq!(result.bbox, Some(BoundingBox::new(10.0, 20.0, 100.0, 150.0)));
  assert_eq!(result.label(), "Male, 30-34");

  let requests = stub.requests();
  assert_eq!(requests.len(), 1);
  let request = &requests[0];
  assert!(request.head.starts_with("POST /predict/ HTTP/1.1"));

  let content_type = request.header("content-type").unwrap();
  let boundary = content_type
    .strip_prefix("multipart/form-data; boundary=")
    .unwrap();
  let text = request.body_text();
  assert!(text.starts_with(&format!("--{}\r\n", boundary)));
  assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"frame.jpg\""));
  assert!(text.contains("Content-Type: image/jpeg\r\n\r\n"));
  assert!(text.ends_with(&format!("\r\n--{}--\r\n", boundary)));
  assert_eq!(text.matches("Content-Disposition").count(), 1);

  let jpeg_start = request
    .body
    .windows(2)
    .position(|w| w == [0xFF, 0xD8])
    .unwrap();
  assert_eq!(
    &request.body[jpeg_start..jpeg_start + payload.bytes.len()],
    payload.bytes.as_slice()
  );
}

#[test]
fn structured_error_is_a_service_failure() {
  let stub = StubEndpoint::serve(|_| Reply::ok(r#"{"error":"No face detected"}"#));
  let failure = predictor(&stub.url)
    .submit(&frame_payload())
    .unwrap_err();
  assert_eq!(failure, PredictFailure::Service("No face detected".to_string()));
}

#[test]
fn non_2xx_is_a_status_failure() {
  let stub = StubEndpoint::serve(|_| Reply::status(500, "Internal Server Error"));
  let failure = predictor(&stub.url)
    .submit(&frame_payload())
    .unwrap_err();
  assert_eq!(failure, PredictFailure::Status(500));
}

#[test]
fn non_json_body_is_malformed() {
  let stub = StubEndpoint::serve(|_| Reply::ok("<html>oops</html>"));
  let failure = predictor(&stub.url)
    .submit(&frame_payload())
    .unwrap_err();
  assert!(matches!(failure, PredictFailure::Malformed(_)));
}

#[test]
fn refused_connection_is_a_transport_failure() {
  let failure = predictor(&closed_endpoint())
    .submit(&frame_payload())
    .unwrap_err();
  assert!(matches!(failure, PredictFailure::Transport(_)));
}

#[test]
fn failure_messages_depend_on_origin() {
  let stub = StubEndpoint::serve(|_| Reply::status(502, "bad gateway"));
  let predictor = predictor(&stub.url);

  let cell = PredictionCell::new();
  cell.set_result(kanxiang::predict::PredictionResult {
    bbox: Some(BoundingBox::new(1.0, 1.0, 2.0, 2.0)),
    gender: kanxiang::predict::Gender::new("Female"),
    age_range: kanxiang::predict::AgeRange::new("20-24"),
  });

  spawn_prediction(predictor.clone(), frame_payload(), cell.clone(), Origin::Capture)
    .join()
    .unwrap();
  assert_eq!(
    StatusLine::from(&cell.state()),
    StatusLine::Error("Prediction failed.".to_string())
  );

  spawn_prediction(predictor, named_payload("me.jpg"), cell.clone(), Origin::Upload)
    .join()
    .unwrap();
  let StatusLine::Error(message) = StatusLine::from(&cell.state()) else {
    panic!("expected an error status");
  };
  assert!(message.starts_with("Prediction failed. Please try again."));
  assert!(message.contains("502"));
  assert!(cell.state().result().is_none());
}

#[test]
fn slower_response_wins_the_race() {
  let stub = StubEndpoint::serve(|request| {
    if request.body_text().contains("filename=\"slow.jpg\"") {
      Reply::ok(r#"{"box":{"x":1,"y":1,"w":5,"h":5},"gender":"Male","age_range":"60-64"}"#)
        .after(Duration::from_millis(400))
    } else {
      Reply::ok(r#"{"box":{"x":2,"y":2,"w":5,"h":5},"gender":"Female","age_range":"10-14"}"#)
    }
  });
  let predictor = predictor(&stub.url);
  let cell = PredictionCell::new();

  let slow = spawn_prediction(
    predictor.clone(),
    named_payload("slow.jpg"),
    cell.clone(),
    Origin::Capture,
  );
  std::thread::sleep(Duration::from_millis(50));
  let fast = spawn_prediction(predictor, named_payload("fast.jpg"), cell.clone(), Origin::Upload);

  fast.join().unwrap();
  assert_eq!(cell.state().result().unwrap().label(), "Female, 10-14");

  slow.join().unwrap();
  let (version, state) = cell.snapshot();
  assert_eq!(version, 2);
  let PredictionState::Showing(result) = state else {
    panic!("expected a result");
  };
  assert_eq!(result.label(), "Male, 60-64");
  assert_eq!(result.bbox, Some(BoundingBox::new(1.0, 1.0, 5.0, 5.0)));
}
