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

//! A minimal in-process TCP listener that speaks enough of the coordinator
//! wire protocol (spec §6.1) to exercise `IpcClient` end-to-end. Mirrors
//! `dummy_server.hpp` in the original source: a test harness, not the
//! product (spec §1) — it lives only here, never as a reusable crate API.

use std::future::Future;
use std::net::TcpListener as StdTcpListener;
use std::time::Duration;

use harvestman::net::messages::{
    CtrlInstruction, DataType, Payload, QueueNodeWire, TagDb, TagType, WorkerCapabilitiesWire,
    WorkerConfigWire, WorkerStatusWire,
};
use harvestman::net::{Connection, IpcClient};

fn test_config(sc: u32) -> WorkerConfigWire {
    WorkerConfigWire {
        user_agent: "harvestman-test/0.1".to_string(),
        day_max_crawls: 5,
        worker_id: 1,
        page_cache_max: 100,
        page_cache_res: 10,
        robots_cache_max: 100,
        robots_cache_res: 10,
        db_path: "/tmp/harvestman-test".to_string(),
        page_table: "pages".to_string(),
        robots_table: "robots".to_string(),
        parse_param: vec![TagDb {
            tag_type: TagType::Url,
            xpath: "//a".to_string(),
            attr: "href".to_string(),
        }],
        sc,
    }
}

/// Spawns a dummy coordinator on an ephemeral port and returns its address.
/// The handler runs on its own thread with its own Tokio runtime, separate
/// from the `IpcClient` under test. `handler` builds the future itself so it
/// can be driven directly by that runtime's `block_on`, rather than nesting
/// a second `block_on` inside the first.
fn spawn_dummy_coordinator<F, Fut>(handler: F) -> String
where
    F: FnOnce(Connection) -> Fut + Send + 'static,
    Fut: Future<Output = ()>,
{
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            listener.set_nonblocking(true).unwrap();
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            let conn = Connection::new(stream).unwrap();
            handler(conn).await;
        });
    });
    addr
}

#[test]
fn register_then_nodes_batch() {
    let addr = spawn_dummy_coordinator(|mut conn| async move {
        conn.async_read().await.unwrap();
        assert_eq!(conn.rx_type(), Some(DataType::Instruction));
        let instr: CtrlInstruction = conn.rx_payload().unwrap();
        assert_eq!(instr, CtrlInstruction::RequestConfig);
        conn.set_tx_payload(Payload::WorkerConfig(test_config(3)));
        conn.async_write().await.unwrap();

        conn.async_read().await.unwrap();
        let instr: CtrlInstruction = conn.rx_payload().unwrap();
        assert_eq!(instr, CtrlInstruction::RequestNodes);
        for i in 0..3u32 {
            conn.set_tx_payload(Payload::QueueNode(QueueNodeWire {
                credit: i * 10,
                url: format!("http://example.com/{i}"),
            }));
            conn.async_write().await.unwrap();
        }
    });

    let client = IpcClient::connect(addr, 1).unwrap();
    let config = client.get_config().unwrap();
    assert_eq!(config.day_max_crawls, 5);
    assert_eq!(config.sc, 3);

    let first = client
        .get_item(Some(Duration::from_secs(5)))
        .expect("expected a prefetched item");
    assert_eq!(first.url(), "http://example.com/0");
    assert_eq!(first.credit(), 0);
}

#[test]
fn status_poll_is_answered_between_turns() {
    let addr = spawn_dummy_coordinator(|mut conn| async move {
        conn.async_read().await.unwrap();
        let instr: CtrlInstruction = conn.rx_payload().unwrap();
        assert_eq!(instr, CtrlInstruction::RequestConfig);
        conn.set_tx_payload(Payload::WorkerConfig(test_config(1)));
        conn.async_write().await.unwrap();

        conn.set_tx_payload(Payload::Instruction(CtrlInstruction::PollStatus));
        conn.async_write().await.unwrap();
        conn.async_read().await.unwrap();
        assert_eq!(conn.rx_type(), Some(DataType::WorkerStatus));
        let status: WorkerStatusWire = conn.rx_payload().unwrap();
        assert_eq!(status, WorkerStatusWire::Active);

        conn.set_tx_payload(Payload::Instruction(CtrlInstruction::PollCapabilities));
        conn.async_write().await.unwrap();
        conn.async_read().await.unwrap();
        assert_eq!(conn.rx_type(), Some(DataType::WorkerCapabilities));
        let caps: WorkerCapabilitiesWire = conn.rx_payload().unwrap();
        assert_eq!(caps.parsers, 2);
    });

    let client = IpcClient::connect(addr, 1).unwrap();
    client.set_status(WorkerStatusWire::Active);
    client.set_capabilities(WorkerCapabilitiesWire {
        parsers: 2,
        total_threads: 2,
    });
    let _ = client.get_config().unwrap();
    std::thread::sleep(Duration::from_millis(200));
}
