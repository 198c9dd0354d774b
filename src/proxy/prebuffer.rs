// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

//! A controllable prebuffer over an upstream body stream.
//!
//! [`Prebuffered`] accumulates chunks for inspection (MIME sniffing, HTML
//! buffering) and can always hand back a stream that yields the buffered
//! bytes first and then falls through to the untouched remainder.

use std::io;

use axum::body::Bytes;
use futures_util::{future, stream, StreamExt};

use super::dispatch::BodyStream;

pub struct Prebuffered {
    buf: Vec<u8>,
    rest: BodyStream,
    finished: bool,
}

impl Prebuffered {
    pub fn new(rest: BodyStream) -> Self {
        Self {
            buf: Vec::new(),
            rest,
            finished: false,
        }
    }

    /// Buffered bytes so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// True once the inner stream has ended; the buffer then holds the whole body.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pull chunks until at least `min` bytes are buffered or the stream ends.
    ///
    /// May overshoot `min` by up to one chunk.
    pub async fn fill_to(&mut self, min: usize) -> io::Result<()> {
        while !self.finished && self.buf.len() < min {
            match self.rest.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => self.finished = true,
            }
        }
        Ok(())
    }

    /// The buffer and the unread remainder.
    pub fn into_parts(self) -> (Vec<u8>, BodyStream) {
        let rest = if self.finished {
            stream::empty().boxed()
        } else {
            self.rest
        };
        (self.buf, rest)
    }

    /// Buffered bytes first, then the remainder, as one stream.
    pub fn into_stream(self) -> BodyStream {
        let (buf, rest) = self.into_parts();
        if buf.is_empty() {
            return rest;
        }
        stream::once(future::ready(Ok(Bytes::from(buf))))
            .chain(rest)
            .boxed()
    }
}
