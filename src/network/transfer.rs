//! Blocking block transfer over a reliable byte stream
//!
//! One request block out, one response block back, strictly alternating.
//! Both directions move exactly one frame or fail: the stream may hand
//! over fewer bytes per call than requested, so the helpers loop until the
//! frame is complete, and a zero-length transfer means the peer is gone.

use std::io::{ErrorKind, Read, Write};

use crate::error::NetworkError;
use crate::protocol::BlockCodec;

/// Write all of `buf` or fail
pub fn send_all<W: Write + ?Sized>(stream: &mut W, buf: &[u8]) -> Result<(), NetworkError> {
    let mut sent = 0;
    while sent < buf.len() {
        match stream.write(&buf[sent..]) {
            Ok(0) => {
                return Err(NetworkError::ConnectionClosed {
                    transferred: sent,
                    expected: buf.len(),
                })
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Fill all of `buf` or fail
pub fn recv_all<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> Result<(), NetworkError> {
    let mut received = 0;
    while received < buf.len() {
        match stream.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(NetworkError::ConnectionClosed {
                    transferred: received,
                    expected: buf.len(),
                })
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Reusable frame buffers for one connection's request/response exchange
pub struct BlockTransfer {
    codec: BlockCodec,
    send_buf: Vec<u8>,
    recv_buf: Vec<u8>,
}

impl BlockTransfer {
    pub fn new(block_len: usize) -> Self {
        let codec = BlockCodec::new(block_len);
        Self {
            codec,
            send_buf: vec![0; codec.frame_len()],
            recv_buf: vec![0; codec.frame_len()],
        }
    }

    /// Send one block
    pub fn send_block<W: Write + ?Sized>(
        &mut self,
        stream: &mut W,
        block: &[f32],
    ) -> Result<(), NetworkError> {
        self.codec.encode_into(block, &mut self.send_buf)?;
        send_all(stream, &self.send_buf)
    }

    /// Receive one block into `out`
    ///
    /// `out` is only written once a whole frame has arrived.
    pub fn recv_block<R: Read + ?Sized>(
        &mut self,
        stream: &mut R,
        out: &mut [f32],
    ) -> Result<(), NetworkError> {
        recv_all(stream, &mut self.recv_buf)?;
        self.codec.decode(&self.recv_buf, out)
    }

    /// One full round trip: send `request`, then wait for the response
    pub fn exchange<S: Read + Write + ?Sized>(
        &mut self,
        stream: &mut S,
        request: &[f32],
        response: &mut [f32],
    ) -> Result<(), NetworkError> {
        self.send_block(stream, request)?;
        self.recv_block(stream, response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// In-memory stream that hands out reads in small chunks and records writes
    pub(crate) struct ChunkedStream {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
        pub max_chunk: usize,
        pub write_budget: Option<usize>,
    }

    impl ChunkedStream {
        pub(crate) fn new(input: Vec<u8>, max_chunk: usize) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
                max_chunk,
                write_budget: None,
            }
        }
    }

    impl Read for ChunkedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(self.max_chunk);
            self.input.read(&mut buf[..len])
        }
    }

    impl Write for ChunkedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut len = buf.len().min(self.max_chunk);
            if let Some(budget) = self.write_budget.as_mut() {
                len = len.min(*budget);
                *budget -= len;
            }
            self.output.extend_from_slice(&buf[..len]);
            Ok(len)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    #[test]
    fn test_recv_reassembles_partial_reads() {
        let samples: Vec<f32> = (0..256).map(|i| i as f32 * 0.01).collect();
        let mut stream = ChunkedStream::new(encode(&samples), 7);
        let mut transfer = BlockTransfer::new(256);

        let mut out = vec![0.0; 256];
        transfer.recv_block(&mut stream, &mut out).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_send_loops_over_partial_writes() {
        let samples = vec![0.5f32; 64];
        let mut stream = ChunkedStream::new(Vec::new(), 5);
        let mut transfer = BlockTransfer::new(64);

        transfer.send_block(&mut stream, &samples).unwrap();
        assert_eq!(stream.output, encode(&samples));
    }

    #[test]
    fn test_short_receive_is_connection_loss() {
        // 100 of 256 bytes, then EOF
        let mut stream = ChunkedStream::new(vec![0u8; 100], 64);
        let mut transfer = BlockTransfer::new(64);

        let mut out = vec![1.0; 64];
        let err = transfer.recv_block(&mut stream, &mut out).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::ConnectionClosed { transferred: 100, expected: 256 }
        ));
        assert!(out.iter().all(|&s| s == 1.0), "partial block leaked into output");
    }

    #[test]
    fn test_zero_byte_receive_is_connection_loss() {
        let mut stream = ChunkedStream::new(Vec::new(), 64);
        let mut buf = [0u8; 16];

        let err = recv_all(&mut stream, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::ConnectionClosed { transferred: 0, expected: 16 }
        ));
    }

    #[test]
    fn test_zero_byte_send_is_connection_loss() {
        let mut stream = ChunkedStream::new(Vec::new(), 64);
        stream.write_budget = Some(10);

        let err = send_all(&mut stream, &[0u8; 32]).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::ConnectionClosed { transferred: 10, expected: 32 }
        ));
    }

    #[test]
    fn test_exchange_sends_then_receives() {
        let response: Vec<f32> = vec![-0.25; 32];
        let mut stream = ChunkedStream::new(encode(&response), 1024);
        let mut transfer = BlockTransfer::new(32);

        let request = vec![0.75f32; 32];
        let mut out = vec![0.0; 32];
        transfer.exchange(&mut stream, &request, &mut out).unwrap();

        assert_eq!(stream.output, encode(&request));
        assert_eq!(out, response);
    }
}
