//! In-memory stand-ins for the network and for image files.

use crate::core::http::{Response, Transport, TransportError};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use url::Url;

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    Body {
        status: u16,
        content_type: String,
        body: Vec<u8>,
    },
    ConnectionError,
}

impl Reply {
    pub fn html(body: &str) -> Self {
        Reply::Body {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn text(body: &str) -> Self {
        Reply::Body {
            status: 200,
            content_type: "text/plain".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn image(body: Vec<u8>) -> Self {
        Reply::Body {
            status: 200,
            content_type: "application/octet-stream".to_string(),
            body,
        }
    }
}

/// A scripted website. Unknown URLs answer 404. A scripted sequence
/// replays its last reply once exhausted.
#[derive(Default)]
pub struct FakeSite {
    routes: RefCell<HashMap<String, VecDeque<Reply>>>,
    requests: RefCell<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, reply: Reply) -> Self {
        self.script(url, vec![reply])
    }

    pub fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        let key = Url::parse(url).unwrap().to_string();
        self.routes.borrow_mut().insert(key, replies.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        let key = Url::parse(url).unwrap().to_string();
        self.requests.borrow().iter().filter(|u| **u == key).count()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.request_count(url) > 0
    }
}

impl Transport for FakeSite {
    fn get(&self, url: &Url) -> Result<Response, TransportError> {
        self.requests.borrow_mut().push(url.to_string());

        let mut routes = self.routes.borrow_mut();
        let reply = match routes.get_mut(url.as_str()) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match reply.unwrap_or(Reply::Status(404)) {
            Reply::Status(status) => Ok(Response {
                status,
                content_type: None,
                body: Vec::new(),
            }),
            Reply::Body {
                status,
                content_type,
                body,
            } => Ok(Response {
                status,
                content_type: Some(content_type),
                body,
            }),
            Reply::ConnectionError => Err(TransportError::Connection(format!(
                "connection refused: {}",
                url
            ))),
        }
    }
}

/// Left half black, right half white.
pub fn vertical_split(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// Top half black, bottom half white.
pub fn horizontal_split(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        if y < height / 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}
