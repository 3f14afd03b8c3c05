use std::io::Cursor;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::{BufMut, Bytes, BytesMut};
use futures::TryStream;
use image::{codecs::jpeg::JpegEncoder, RgbImage};

pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Wrap one JPEG as a multipart part
pub fn frame_chunk(jpeg: &[u8]) -> Bytes {
    let mut chunk = BytesMut::with_capacity(PART_HEADER.len() + jpeg.len() + 2);
    chunk.put_slice(PART_HEADER);
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Bytes> {
    let mut jpeg = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
        encoder.encode_image(image)?;
    }
    Ok(Bytes::from(jpeg.into_inner()))
}

/// Serve a stream of multipart chunks as a never-ending MJPEG response
pub fn stream_response<S>(chunks: S) -> Response
where
    S: TryStream + Send + 'static,
    S::Ok: Into<Bytes>,
    S::Error: Into<axum::BoxError>,
{
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(chunks),
    )
        .into_response()
}
