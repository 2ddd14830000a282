//! Publishing a rendered frame as the user's profile picture.

use crate::{
    config::{Config, Transport},
    error::{Error, Result},
};
use image::{ImageFormat, RgbaImage};
use reqwest::{
    StatusCode,
    blocking::{
        Client,
        multipart::{Form, Part},
    },
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use std::{io::Cursor, time::Duration};

const FORM_FIELD: &str = "image";
const FILE_NAME: &str = "frame.png";
const CONTENT_TYPE_PNG: &str = "image/png";

/// Encodes the frame as PNG, keeping the alpha channel.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cur = Cursor::new(&mut buf);
    image.write_to(&mut cur, ImageFormat::Png)?;
    Ok(buf)
}

/// Something that can replace the profile picture with a PNG.
///
/// Each call makes exactly one attempt.
pub trait PhotoUploader {
    fn upload(&self, png: Vec<u8>) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Builds the uploader selected by `config.transport`.
pub fn from_config(config: &Config) -> Result<Box<dyn PhotoUploader>> {
    let token = config.token()?.to_string();

    let uploader: Box<dyn PhotoUploader> = match config.transport {
        Transport::Http => Box::new(HttpUploader::new(
            config.endpoint_url()?,
            token,
            config.timeout(),
        )?),
        Transport::Slack => Box::new(SlackUploader::new(
            config.slack_api_url.clone(),
            token,
            config.timeout(),
        )?),
    };

    log::debug!("using {} uploader", uploader.name());
    Ok(uploader)
}

fn headers(token: &str, accept: &'static str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::Config("auth token is not a valid header value".into()))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    Ok(headers)
}

fn photo_form(png: Vec<u8>) -> Result<Form> {
    let part = Part::bytes(png)
        .file_name(FILE_NAME)
        .mime_str(CONTENT_TYPE_PNG)?;
    Ok(Form::new().part(FORM_FIELD, part))
}

fn client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Plain multipart POST with bearer auth; only `200 OK` counts as success.
#[derive(Debug)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
}

impl HttpUploader {
    pub fn new(endpoint: String, token: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client(timeout)?,
            headers: headers(&token, "application/json")?,
            endpoint,
        })
    }
}

impl PhotoUploader for HttpUploader {
    fn upload(&self, png: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .multipart(photo_form(png)?)
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(Error::Status { status, body });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[derive(Deserialize, Debug)]
struct SetPhotoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API `users.setPhoto`. Slack answers `200` even for failures and
/// reports them in the JSON body.
#[derive(Debug)]
pub struct SlackUploader {
    client: Client,
    api_url: String,
    headers: HeaderMap,
}

impl SlackUploader {
    pub fn new(api_url: String, token: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client(timeout)?,
            headers: headers(&token, "application/json")?,
            api_url,
        })
    }
}

impl PhotoUploader for SlackUploader {
    fn upload(&self, png: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .headers(self.headers.clone())
            .multipart(photo_form(png)?)
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(Error::Status { status, body });
        }

        let reply: SetPhotoResponse = response.json()?;
        if !reply.ok {
            return Err(Error::Api(
                reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use image::{ImageBuffer, Rgba};
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    /// Raw request as seen by the server: lowercased head and the body.
    struct Captured {
        head: String,
        body: Vec<u8>,
    }

    /// Serves one request with `status` and `body`, then returns what it got.
    fn one_shot_server(
        status: &'static str,
        body: &'static str,
    ) -> Result<(String, JoinHandle<Captured>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/api/v4/users/u1/image", listener.local_addr()?);

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                head.push_str(&line.to_ascii_lowercase());
            }

            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok());

            let mut received = Vec::new();
            match length {
                Some(length) => {
                    received.resize(length, 0);
                    reader.read_exact(&mut received).expect("read body");
                }
                None => {
                    // chunked: good enough to read until the terminating chunk
                    loop {
                        let mut line = String::new();
                        reader.read_line(&mut line).expect("read chunk size");
                        let size = usize::from_str_radix(line.trim(), 16).expect("chunk size");
                        let mut chunk = vec![0; size + 2];
                        reader.read_exact(&mut chunk).expect("read chunk");
                        if size == 0 {
                            break;
                        }
                        received.extend_from_slice(&chunk[..size]);
                    }
                }
            }

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
            stream.flush().expect("flush");

            Captured {
                head,
                body: received,
            }
        });

        Ok((url, handle))
    }

    fn tiny_png() -> Result<Vec<u8>> {
        let image: RgbaImage = ImageBuffer::from_pixel(2, 2, Rgba([255, 0, 0, 128]));
        Ok(encode_png(&image)?)
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[test]
    fn test_encode_png_keeps_alpha() -> Result<()> {
        let image: RgbaImage = ImageBuffer::from_fn(3, 2, |x, y| Rgba([10, 20, 30, (x * 60 + y) as u8]));
        let png = encode_png(&image)?;

        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)?.to_rgba8();
        assert_eq!(decoded, image);

        Ok(())
    }

    #[test]
    fn test_http_upload_request_shape() -> Result<()> {
        let (url, server) = one_shot_server("200 OK", "{}")?;
        let png = tiny_png()?;

        let uploader = HttpUploader::new(url, "s3cret".into(), Duration::from_secs(5))?;
        uploader.upload(png.clone())?;

        let captured = server.join().expect("server thread");
        assert!(captured.head.starts_with("post /api/v4/users/u1/image http/1.1"));
        assert!(captured.head.contains("authorization: bearer s3cret"));
        assert!(captured.head.contains("accept: application/json"));
        assert!(captured.head.contains("content-type: multipart/form-data"));

        assert!(contains(
            &captured.body,
            b"Content-Disposition: form-data; name=\"image\"; filename=\"frame.png\""
        ));
        assert!(contains(&captured.body, b"Content-Type: image/png"));
        assert!(contains(&captured.body, &png));

        Ok(())
    }

    #[test]
    fn test_http_upload_non_200_fails() -> Result<()> {
        let (url, server) = one_shot_server("201 Created", "{\"id\":1}")?;

        let uploader = HttpUploader::new(url, "s3cret".into(), Duration::from_secs(5))?;
        let err = uploader.upload(tiny_png()?).unwrap_err();
        server.join().expect("server thread");

        match err {
            Error::Status { status, body } => {
                assert_eq!(status, StatusCode::CREATED);
                assert_eq!(body, "{\"id\":1}");
            }
            other => panic!("unexpected error: {other}"),
        }

        Ok(())
    }

    #[test]
    fn test_slack_upload_ok() -> Result<()> {
        let (url, server) = one_shot_server("200 OK", "{\"ok\":true}")?;

        let uploader = SlackUploader::new(url, "xoxp-1".into(), Duration::from_secs(5))?;
        uploader.upload(tiny_png()?)?;

        let captured = server.join().expect("server thread");
        assert!(captured.head.contains("authorization: bearer xoxp-1"));
        assert!(contains(&captured.body, b"name=\"image\""));

        Ok(())
    }

    #[test]
    fn test_slack_api_error() -> Result<()> {
        let (url, server) = one_shot_server("200 OK", "{\"ok\":false,\"error\":\"invalid_auth\"}")?;

        let uploader = SlackUploader::new(url, "bad".into(), Duration::from_secs(5))?;
        let err = uploader.upload(tiny_png()?).unwrap_err();
        server.join().expect("server thread");

        assert!(matches!(err, Error::Api(ref code) if code == "invalid_auth"));

        Ok(())
    }

    #[test]
    fn test_from_config_selects_transport() -> Result<()> {
        let mut config = Config {
            token: Some("t".into()),
            user_id: Some("u".into()),
            ..Default::default()
        };
        assert_eq!(from_config(&config)?.name(), "http");

        config.transport = Transport::Slack;
        assert_eq!(from_config(&config)?.name(), "slack");

        config.token = None;
        assert!(matches!(from_config(&config), Err(Error::Config(_))));

        Ok(())
    }

    #[test]
    fn test_from_config_needs_user_id_for_template() {
        let config = Config {
            token: Some("t".into()),
            ..Default::default()
        };
        assert!(matches!(from_config(&config), Err(Error::Config(_))));
    }
}
