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

//! Worker side of the coordinator protocol (spec §4.2): prefetch/drain
//! buffers plus request/response correlation over a single [`Connection`].
//!
//! A dedicated OS thread owns the connection and runs a single-threaded
//! Tokio runtime; callers enqueue [`DriverTask`]s and block on a condition
//! variable for the results the protocol demands synchronously
//! (`get_config`, the blocking form of `get_item`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::model::work_item::WorkItem;
use crate::net::connection::Connection;
use crate::net::errors::{IpcError, TransportError};
use crate::net::messages::{
    CtrlInstruction, DataType, Payload, WorkerCapabilitiesWire, WorkerConfigWire,
    WorkerStatusWire,
};

/// Work handed from a caller thread to the driver. One task = one protocol
/// turn per spec §4.2's "runs exactly one protocol turn before looking
/// again" scheduler rule, except `RequestNodes`/`SendBatch` which each
/// complete their whole exchange before the driver looks at the task queue
/// again (the state machine has no other re-entrant point mid-exchange).
#[derive(Debug)]
enum DriverTask {
    RequestConfig,
    RequestNodes,
    SendBatch,
    Shutdown,
}

struct State {
    get_buffer: VecDeque<WorkItem>,
    send_buffer: VecDeque<WorkItem>,
    config: Option<WorkerConfigWire>,
    status: WorkerStatusWire,
    capabilities: WorkerCapabilitiesWire,
    connected: bool,
    nodes_inflight: bool,
    send_inflight: bool,
    last_error: Option<String>,
}

struct Shared {
    state: Mutex<State>,
    cvar: Condvar,
    sc: AtomicU32,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                get_buffer: VecDeque::new(),
                send_buffer: VecDeque::new(),
                config: None,
                status: WorkerStatusWire::Sleep,
                capabilities: WorkerCapabilitiesWire {
                    parsers: 0,
                    total_threads: 0,
                },
                connected: true,
                nodes_inflight: false,
                send_inflight: false,
                last_error: None,
            }),
            cvar: Condvar::new(),
            // A conservative default used only if `RequestNodes` somehow
            // runs before `get_config` has ever completed.
            sc: AtomicU32::new(1),
        }
    }

    fn fail(&self, reason: String) {
        error!("ipc driver disconnecting: {reason}");
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.last_error = Some(reason);
        state.nodes_inflight = false;
        state.send_inflight = false;
        self.cvar.notify_all();
    }
}

/// Worker-side handle to the coordinator connection (spec §4.2).
pub struct IpcClient {
    shared: Arc<Shared>,
    task_tx: UnboundedSender<DriverTask>,
    driver_thread: Option<JoinHandle<()>>,
    gbuff_min: usize,
}

impl IpcClient {
    /// Connects to `addr` and starts the background driver. Blocks the
    /// calling thread until the TCP connection is established (or fails).
    pub fn connect(addr: String, gbuff_min: usize) -> Result<Self, IpcError> {
        let shared = Arc::new(Shared::new());
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let shared_for_driver = shared.clone();
        let driver_thread = std::thread::Builder::new()
            .name("ipc-driver".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(TransportError::Io(e)));
                        return;
                    }
                };
                rt.block_on(async move {
                    let stream = match TcpStream::connect(&addr).await {
                        Ok(s) => s,
                        Err(e) => {
                            let _ = ready_tx.send(Err(TransportError::Io(e)));
                            return;
                        }
                    };
                    let conn = match Connection::new(stream) {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    info!("ipc driver connected to {addr}");
                    run_driver(conn, shared_for_driver, task_rx).await;
                });
            })
            .expect("spawn ipc driver thread");

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(IpcError::DriverGone),
        }

        Ok(Self {
            shared,
            task_tx,
            driver_thread: Some(driver_thread),
            gbuff_min,
        })
    }

    fn check_connected(&self, state: &State) -> Result<(), IpcError> {
        if state.connected {
            Ok(())
        } else {
            Err(IpcError::Disconnected)
        }
    }

    /// Sends `CtrlRequestConfig` and blocks until the coordinator replies.
    pub fn get_config(&self) -> Result<WorkerConfigWire, IpcError> {
        let mut state = self.shared.state.lock().unwrap();
        self.check_connected(&state)?;
        if state.config.is_none() {
            self.task_tx
                .send(DriverTask::RequestConfig)
                .map_err(|_| IpcError::DriverGone)?;
        }
        loop {
            if let Some(cfg) = &state.config {
                return Ok(cfg.clone());
            }
            self.check_connected(&state)?;
            state = self.shared.cvar.wait(state).unwrap();
        }
    }

    /// Pops from the local get-buffer. If it's running low, proactively
    /// queues a `RequestNodes` turn. `timeout: None` is the non-blocking
    /// variant (`QueueEmpty` if nothing is buffered); `Some(d)` blocks up to
    /// `d` waiting for the driver to fill the buffer.
    pub fn get_item(&self, timeout: Option<Duration>) -> Result<WorkItem, GetItemError> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut state = self.shared.state.lock().unwrap();
        loop {
            self.check_connected(&state)
                .map_err(GetItemError::Ipc)?;
            if let Some(item) = state.get_buffer.pop_front() {
                self.maybe_request_nodes(&mut state);
                return Ok(item);
            }
            self.maybe_request_nodes(&mut state);
            match deadline {
                None => return Err(GetItemError::Empty),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(GetItemError::Empty);
                    }
                    let (guard, result) = self
                        .shared
                        .cvar
                        .wait_timeout(state, deadline - now)
                        .unwrap();
                    state = guard;
                    if result.timed_out() && state.get_buffer.is_empty() {
                        return Err(GetItemError::Empty);
                    }
                }
            }
        }
    }

    fn maybe_request_nodes(&self, state: &mut State) {
        if state.get_buffer.len() < self.gbuff_min && !state.nodes_inflight {
            state.nodes_inflight = true;
            if self.task_tx.send(DriverTask::RequestNodes).is_err() {
                state.nodes_inflight = false;
            }
        }
    }

    /// Enqueues `item` into the send-buffer and prompts the driver to drain
    /// it to the coordinator.
    pub fn send_item(&self, item: WorkItem) -> Result<(), IpcError> {
        let mut state = self.shared.state.lock().unwrap();
        self.check_connected(&state)?;
        state.send_buffer.push_back(item);
        if state.send_buffer.len() > Self::SBUFF_WARN_THRESHOLD {
            warn!(
                "ipc send-buffer backlog at {} items",
                state.send_buffer.len()
            );
        }
        if !state.send_inflight {
            state.send_inflight = true;
            if self.task_tx.send(DriverTask::SendBatch).is_err() {
                state.send_inflight = false;
                return Err(IpcError::DriverGone);
            }
        }
        Ok(())
    }

    const SBUFF_WARN_THRESHOLD: usize = 64;

    pub fn set_status(&self, status: WorkerStatusWire) {
        let mut state = self.shared.state.lock().unwrap();
        state.status = status;
    }

    pub fn set_capabilities(&self, capabilities: WorkerCapabilitiesWire) {
        let mut state = self.shared.state.lock().unwrap();
        state.capabilities = capabilities;
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().unwrap().connected
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        let _ = self.task_tx.send(DriverTask::Shutdown);
        if let Some(handle) = self.driver_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Error from the non-blocking or timed [`IpcClient::get_item`].
#[derive(Debug, thiserror::Error)]
pub enum GetItemError {
    #[error("no work item buffered")]
    Empty,
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

async fn run_driver(
    mut conn: Connection,
    shared: Arc<Shared>,
    mut task_rx: UnboundedReceiver<DriverTask>,
) {
    loop {
        tokio::select! {
            biased;
            task = task_rx.recv() => {
                match task {
                    None | Some(DriverTask::Shutdown) => {
                        debug!("ipc driver shutting down");
                        let mut state = shared.state.lock().unwrap();
                        state.connected = false;
                        shared.cvar.notify_all();
                        return;
                    }
                    Some(task) => {
                        if let Err(e) = handle_task(&mut conn, &shared, task).await {
                            shared.fail(e.to_string());
                            return;
                        }
                    }
                }
            }
            result = conn.async_read() => {
                match result {
                    Ok(()) => {
                        if let Err(e) = handle_unsolicited(&mut conn, &shared).await {
                            shared.fail(e.to_string());
                            return;
                        }
                    }
                    Err(e) => {
                        shared.fail(e.to_string());
                        return;
                    }
                }
            }
        }
    }
}

async fn handle_task(
    conn: &mut Connection,
    shared: &Arc<Shared>,
    task: DriverTask,
) -> Result<(), TransportError> {
    match task {
        DriverTask::Shutdown => Ok(()),
        DriverTask::RequestConfig => {
            trace!("ipc: -> wconfig");
            conn.set_tx_payload(Payload::Instruction(CtrlInstruction::RequestConfig));
            conn.async_write().await?;
            let payload = read_expecting(conn, shared, DataType::WorkerConfig).await?;
            if let Payload::WorkerConfig(cfg) = payload {
                shared.sc.store(cfg.sc, Ordering::Relaxed);
                let mut state = shared.state.lock().unwrap();
                state.config = Some(cfg);
                shared.cvar.notify_all();
            }
            Ok(())
        }
        DriverTask::RequestNodes => {
            trace!("ipc: -> wnodes");
            conn.set_tx_payload(Payload::Instruction(CtrlInstruction::RequestNodes));
            conn.async_write().await?;
            let sc = shared.sc.load(Ordering::Relaxed).max(1);
            for _ in 0..sc {
                let payload = read_expecting(conn, shared, DataType::QueueNode).await?;
                if let Payload::QueueNode(node) = payload {
                    let mut state = shared.state.lock().unwrap();
                    state.get_buffer.push_back(node.into());
                    shared.cvar.notify_all();
                }
            }
            let mut state = shared.state.lock().unwrap();
            state.nodes_inflight = false;
            debug!("ipc: get_buffer now {} items", state.get_buffer.len());
            Ok(())
        }
        DriverTask::SendBatch => {
            loop {
                let item = {
                    let mut state = shared.state.lock().unwrap();
                    match state.send_buffer.pop_front() {
                        Some(item) => item,
                        None => {
                            state.send_inflight = false;
                            break;
                        }
                    }
                };
                trace!("ipc: -> queue_node (unsolicited)");
                conn.set_tx_payload(Payload::QueueNode(item.into()));
                conn.async_write().await?;
            }
            Ok(())
        }
    }
}

/// Reads frames until one matching `expect` arrives, transparently answering
/// any interleaved coordinator poll along the way (spec §4.2's "any -> recv
/// CtrlInstruction(mstatus|mcap) -> push status/caps -> previous").
async fn read_expecting(
    conn: &mut Connection,
    shared: &Arc<Shared>,
    expect: DataType,
) -> Result<Payload, TransportError> {
    loop {
        conn.async_read().await?;
        match conn.rx_type() {
            Some(DataType::Instruction) => {
                answer_poll(conn, shared).await?;
            }
            Some(t) if t == expect => return Ok(conn.rx_payload_full()?),
            _ => return Err(TransportError::InvalidHeader),
        }
    }
}

async fn handle_unsolicited(
    conn: &mut Connection,
    shared: &Arc<Shared>,
) -> Result<(), TransportError> {
    match conn.rx_type() {
        Some(DataType::Instruction) => answer_poll(conn, shared).await,
        _ => Err(TransportError::InvalidHeader),
    }
}

async fn answer_poll(conn: &mut Connection, shared: &Arc<Shared>) -> Result<(), TransportError> {
    let instr: CtrlInstruction = conn.rx_payload()?;
    match instr {
        CtrlInstruction::PollStatus => {
            let status = shared.state.lock().unwrap().status;
            trace!("ipc: <- mstatus, -> wstatus");
            conn.set_tx_payload(Payload::WorkerStatus(status));
            conn.async_write().await
        }
        CtrlInstruction::PollCapabilities => {
            let capabilities = shared.state.lock().unwrap().capabilities;
            trace!("ipc: <- mcap, -> wcap");
            conn.set_tx_payload(Payload::WorkerCapabilities(capabilities));
            conn.async_write().await
        }
        _ => Err(TransportError::InvalidHeader),
    }
}
