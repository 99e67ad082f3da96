// 该文件是 Kanxiang （看相） 项目的一部分。
// tests/support/mod.rs - 测试用的预测服务桩
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

#![allow(dead_code)]

use std::{
  io::{BufRead, BufReader, Read, Write},
  net::{TcpListener, TcpStream},
  sync::{Arc, Mutex},
  thread,
  time::{Duration, Instant},
};

use url::Url;

pub const FACE: &str =
  r#"{"box":{"x":10,"y":20,"w":100,"h":150},"gender":"Male","age_range":"30-34"}"#;

#[derive(Debug, Clone)]
pub struct Request {
  pub head: String,
  pub body: Vec<u8>,
}

impl Request {
  pub fn body_text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  pub fn header(&self, name: &str) -> Option<String> {
    self.head.lines().find_map(|line| {
      let (key, value) = line.split_once(':')?;
      key
        .trim()
        .eq_ignore_ascii_case(name)
        .then(|| value.trim().to_string())
    })
  }
}

pub struct Reply {
  pub status: u16,
  pub body: String,
  pub delay: Duration,
}

impl Reply {
  pub fn ok(body: &str) -> Self {
    Self {
      status: 200,
      body: body.to_string(),
      delay: Duration::ZERO,
    }
  }

  pub fn status(status: u16, body: &str) -> Self {
    Self {
      status,
      body: body.to_string(),
      delay: Duration::ZERO,
    }
  }

  pub fn after(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

/// 每个连接一个线程的最小 HTTP/1.1 服务
pub struct StubEndpoint {
  pub url: Url,
  requests: Arc<Mutex<Vec<Request>>>,
}

impl StubEndpoint {
  pub fn serve<F>(respond: F) -> Self
  where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
  {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = Url::parse(&format!("http://{}/predict/", listener.local_addr().unwrap())).unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    {
      let requests = requests.clone();
      thread::spawn(move || {
        for stream in listener.incoming() {
          let Ok(stream) = stream else { break };
          let respond = respond.clone();
          let requests = requests.clone();
          thread::spawn(move || handle(stream, respond.as_ref(), &requests));
        }
      });
    }

    Self { url, requests }
  }

  pub fn requests(&self) -> Vec<Request> {
    self.requests.lock().unwrap().clone()
  }

  pub fn wait_for_requests(&self, count: usize, timeout: Duration) -> Vec<Request> {
    let deadline = Instant::now() + timeout;
    while self.requests.lock().unwrap().len() < count && Instant::now() < deadline {
      thread::sleep(Duration::from_millis(10));
    }
    self.requests()
  }
}

fn handle(
  mut stream: TcpStream,
  respond: &(dyn Fn(&Request) -> Reply + Send + Sync),
  requests: &Mutex<Vec<Request>>,
) {
  let mut reader = BufReader::new(stream.try_clone().unwrap());
  let mut head = String::new();
  loop {
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap_or(0) == 0 {
      return;
    }
    if line == "\r\n" {
      break;
    }
    head.push_str(&line);
  }

  let mut request = Request {
    head,
    body: Vec::new(),
  };
  let length = request
    .header("content-length")
    .and_then(|v| v.parse::<usize>().ok())
    .unwrap_or(0);
  request.body = vec![0; length];
  if reader.read_exact(&mut request.body).is_err() {
    return;
  }

  let reply = respond(&request);
  requests.lock().unwrap().push(request);
  thread::sleep(reply.delay);

  let reason = if reply.status < 400 { "OK" } else { "Error" };
  let _ = write!(
    stream,
    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
    reply.status,
    reason,
    reply.body.len(),
    reply.body
  );
  let _ = stream.flush();
}

/// 一个已经关闭的本地端口
pub fn closed_endpoint() -> Url {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);
  Url::parse(&format!("http://{}/predict/", addr)).unwrap()
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if cond() {
      return true;
    }
    thread::sleep(Duration::from_millis(10));
  }
  cond()
}
