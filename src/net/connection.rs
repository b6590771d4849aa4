// Copyright 2024 The Harvestman Authors
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

//! Framed typed-message transport over a single TCP stream (spec §4.1).
//!
//! A frame is a fixed-size header (`{data_type, data_size}`, bincode-encoded)
//! followed by `data_size` bytes of bincode-encoded payload. The connection
//! is half-duplex: rx and tx share no state, but a caller must not overlap a
//! read and a write on the same `Connection` — the [`super::IpcClient`]
//! scheduler enforces this by running one protocol turn at a time.

use crate::net::errors::TransportError;
use crate::net::messages::{DataType, Payload};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Header {
    data_type: DataType,
    data_size: u64,
}

/// Resumable progress through one frame read. Kept as struct state (rather
/// than local variables inside one `read_exact` future) so that racing
/// `async_read` against another future in `select!` and losing never drops
/// already-read bytes: `TcpStream::read` itself is cancel-safe, and every
/// byte it returns is folded into this state before the next `.await`.
enum RxStage {
    Header { buf: Vec<u8>, filled: usize },
    Data { header: Header, buf: Vec<u8>, filled: usize },
}

/// A single framed connection to the coordinator.
pub struct Connection {
    stream: TcpStream,
    header_raw_size: usize,
    tx_payload: Option<Payload>,
    rx_type: Option<DataType>,
    rx_payload: Option<Vec<u8>>,
    rx_stage: RxStage,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        // Establish the header size once, the way spec §4.1 requires, by
        // serializing a zero-valued header.
        let probe = Header {
            data_type: DataType::Instruction,
            data_size: 0,
        };
        let header_raw_size = bincode::serialized_size(&probe)? as usize;
        Ok(Self {
            stream,
            header_raw_size,
            tx_payload: None,
            rx_type: None,
            rx_payload: None,
            rx_stage: RxStage::Header {
                buf: vec![0u8; header_raw_size],
                filled: 0,
            },
        })
    }

    /// Stages a payload for the next [`Self::async_write`].
    pub fn set_tx_payload(&mut self, payload: Payload) {
        self.tx_payload = Some(payload);
    }

    /// The [`DataType`] of the most recently completed [`Self::async_read`].
    pub fn rx_type(&self) -> Option<DataType> {
        self.rx_type
    }

    /// Deserializes the most recently read payload as `T`.
    pub fn rx_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, TransportError> {
        let bytes = self
            .rx_payload
            .as_ref()
            .ok_or(TransportError::InvalidHeader)?;
        Ok(bincode::deserialize(bytes)?)
    }

    /// Convenience: decode the most recently read frame as the typed
    /// [`Payload`], dispatching on [`Self::rx_type`].
    pub fn rx_payload_full(&self) -> Result<Payload, TransportError> {
        let data_type = self.rx_type.ok_or(TransportError::InvalidHeader)?;
        Ok(match data_type {
            DataType::Instruction => Payload::Instruction(self.rx_payload()?),
            DataType::WorkerStatus => Payload::WorkerStatus(self.rx_payload()?),
            DataType::WorkerCapabilities => Payload::WorkerCapabilities(self.rx_payload()?),
            DataType::WorkerConfig => Payload::WorkerConfig(self.rx_payload()?),
            DataType::QueueNode => Payload::QueueNode(self.rx_payload()?),
        })
    }

    /// Emits exactly one frame: the header, then the staged payload bytes.
    ///
    /// The payload on the wire is the *inner* value only (e.g. a bare
    /// `QueueNodeWire`), not the `Payload` enum wrapper — the wrapper exists
    /// so Rust call sites are statically typed, but `data_type` in the
    /// header is what tells the peer how to decode the bytes that follow.
    pub async fn async_write(&mut self) -> Result<(), TransportError> {
        let payload = self
            .tx_payload
            .take()
            .expect("set_tx_payload must be called before async_write");
        let data = match &payload {
            Payload::Instruction(v) => bincode::serialize(v),
            Payload::WorkerStatus(v) => bincode::serialize(v),
            Payload::WorkerCapabilities(v) => bincode::serialize(v),
            Payload::WorkerConfig(v) => bincode::serialize(v),
            Payload::QueueNode(v) => bincode::serialize(v),
        }?;
        let header = Header {
            data_type: payload.data_type(),
            data_size: data.len() as u64,
        };
        let header_bytes = bincode::serialize(&header)?;
        if header_bytes.len() != self.header_raw_size {
            return Err(TransportError::InvalidArgument);
        }
        self.stream.write_all(&header_bytes).await?;
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads exactly one frame. On success, [`Self::rx_type`] and
    /// [`Self::rx_payload`] reflect what was read.
    ///
    /// Safe to race in a `tokio::select!` against another future: if this
    /// call loses the race mid-frame, the next call resumes from the byte
    /// it left off at instead of re-reading (and desyncing) the stream.
    pub async fn async_read(&mut self) -> Result<(), TransportError> {
        loop {
            match &mut self.rx_stage {
                RxStage::Header { buf, filled } => {
                    while *filled < buf.len() {
                        let n = self.stream.read(&mut buf[*filled..]).await?;
                        if n == 0 {
                            return Err(TransportError::ShortRead {
                                expected: buf.len(),
                                got: *filled,
                            });
                        }
                        *filled += n;
                    }
                    let header: Header = bincode::deserialize(buf)?;
                    if header.data_size == 0 {
                        self.rx_stage = RxStage::Header {
                            buf: vec![0u8; self.header_raw_size],
                            filled: 0,
                        };
                        return Err(TransportError::InvalidHeader);
                    }
                    self.rx_stage = RxStage::Data {
                        buf: vec![0u8; header.data_size as usize],
                        header,
                        filled: 0,
                    };
                }
                RxStage::Data { header, buf, filled } => {
                    while *filled < buf.len() {
                        let n = self.stream.read(&mut buf[*filled..]).await?;
                        if n == 0 {
                            return Err(TransportError::ShortRead {
                                expected: buf.len(),
                                got: *filled,
                            });
                        }
                        *filled += n;
                    }
                    self.rx_type = Some(header.data_type);
                    self.rx_payload = Some(std::mem::take(buf));
                    self.rx_stage = RxStage::Header {
                        buf: vec![0u8; self.header_raw_size],
                        filled: 0,
                    };
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::messages::{CtrlInstruction, QueueNodeWire};
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_fut = TcpStream::connect(addr);
        let (server_stream, _) = listener.accept().await.unwrap();
        let client_stream = client_fut.await.unwrap();
        (
            Connection::new(server_stream).unwrap(),
            Connection::new(client_stream).unwrap(),
        )
    }

    #[tokio::test]
    async fn write_then_read_round_trips_a_queue_node() {
        let (mut a, mut b) = pair().await;
        a.set_tx_payload(Payload::QueueNode(QueueNodeWire {
            credit: 25,
            url: "http://example.com/x".to_string(),
        }));
        a.async_write().await.unwrap();
        b.async_read().await.unwrap();
        assert_eq!(b.rx_type(), Some(DataType::QueueNode));
        let payload: QueueNodeWire = b.rx_payload().unwrap();
        assert_eq!(payload.credit, 25);
        assert_eq!(payload.url, "http://example.com/x");
    }

    #[tokio::test]
    async fn write_then_read_round_trips_an_instruction() {
        let (mut a, mut b) = pair().await;
        a.set_tx_payload(Payload::Instruction(CtrlInstruction::RequestNodes));
        a.async_write().await.unwrap();
        b.async_read().await.unwrap();
        assert_eq!(b.rx_type(), Some(DataType::Instruction));
        let payload: CtrlInstruction = b.rx_payload().unwrap();
        assert_eq!(payload, CtrlInstruction::RequestNodes);
    }
}
