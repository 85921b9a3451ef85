// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conversion of live traffic into canonical `Request`/`Response` snapshots.

use crate::engine_core::constants::http;
use crate::engine_core::errors::ProbeError;
use crate::engine_core::models::{Request, Response, UrlType};
use bytes::{BufMut, Bytes, BytesMut};
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE, HOST};
use std::collections::HashMap;
use std::io::{ErrorKind, Read};

pub fn parse_url(url: &reqwest::Url) -> UrlType {
    UrlType::from(url)
}

/// Snapshot an outgoing request. Only buffered bodies can be captured.
pub fn parse_request(request: &reqwest::Request) -> Result<Request, ProbeError> {
    let (headers, raw_header) = header_snapshot(request.headers());
    let body = match request.body() {
        None => Bytes::new(),
        Some(body) => body.as_bytes().map(Bytes::copy_from_slice).ok_or_else(|| {
            ProbeError::RequestError("Get request error: streaming body cannot be captured".to_string())
        })?,
    };

    Ok(Request {
        method: request.method().as_str().to_string(),
        url: parse_url(request.url()),
        content_type: header_value(request.headers(), CONTENT_TYPE.as_str()),
        headers,
        raw_header,
        raw: dump_request(request),
        body,
    })
}

/// Snapshot a received response, reading and decoding its body
pub async fn parse_response(response: reqwest::Response, latency: i64) -> Result<Response, ProbeError> {
    let status = i64::from(response.status().as_u16());
    let url = parse_url(response.url());
    let (headers, raw_header) = header_snapshot(response.headers());
    let content_type = header_value(response.headers(), CONTENT_TYPE.as_str());
    let encoded = response.headers().clone();

    let raw = response
        .bytes()
        .await
        .map_err(|e| ProbeError::ResponseError(format!("Get response body error: {}", e)))?;
    let body = decode_body(&encoded, raw)?;

    Ok(Response {
        status,
        url,
        headers,
        raw_header,
        content_type,
        raw: body.clone(),
        body,
        latency,
    })
}

/// Inflate a gzip-encoded body; any other body is returned as is
pub fn decode_body(headers: &HeaderMap, raw: Bytes) -> Result<Bytes, ProbeError> {
    let gzipped = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
    if !gzipped {
        return Ok(raw);
    }

    let mut decoder = GzDecoder::new(&raw[..]);
    let mut body = BytesMut::with_capacity(raw.len());
    let mut buf = [0u8; http::GZIP_CHUNK_SIZE];
    loop {
        match decoder.read(&mut buf) {
            Ok(0) => break,
            // The final read is usually short; only the bytes read are kept
            Ok(n) => body.put_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ProbeError::ResponseError(format!(
                    "Get response body error: {}",
                    e
                )))
            }
        }
    }
    Ok(body.freeze())
}

/// Render an outgoing request in HTTP/1.1 wire form
pub fn dump_request(request: &reqwest::Request) -> Bytes {
    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut out = BytesMut::new();
    out.put_slice(format!("{} {} HTTP/1.1\r\n", request.method(), target).as_bytes());
    out.put_slice(format!("Host: {}\r\n", host).as_bytes());
    for (name, value) in request.headers() {
        if *name == HOST {
            continue;
        }
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    if let Some(body) = request.body().and_then(|b| b.as_bytes()) {
        out.put_slice(body);
    }
    out.freeze()
}

/// Last value per header name, plus `name=value` lines in map iteration order
fn header_snapshot(headers: &HeaderMap) -> (HashMap<String, String>, Bytes) {
    let mut map = HashMap::with_capacity(headers.keys_len());
    let mut lines = Vec::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let value = header_value(headers, name.as_str());
        lines.push(format!("{}={}", name, value));
        map.insert(name.as_str().to_string(), value);
    }
    (map, Bytes::from(lines.join("\n")))
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .last()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}
