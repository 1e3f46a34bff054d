// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use metrics::gauge;
use rand::Rng;
use tokio::sync::{Mutex, mpsc};

use crate::models::message::MessageFormat;

pub const DEFAULT_PARTITIONS: usize = 5;

/// Bound per partition. Producers back off (await) once a partition is full.
const PARTITION_CAPACITY: usize = 1024;

struct Partition {
    tx: mpsc::Sender<MessageFormat>,
    rx: Mutex<mpsc::Receiver<MessageFormat>>,
}

/// Bounded multi-partition FIFO of cover-traffic message descriptors.
///
/// Partitions let one consumer per node drain independently without
/// head-of-line blocking; order within a partition is strict FIFO. There is
/// no priority and no dropping. Created once in `main` and shared as `Arc`.
pub struct MessageQueue {
    partitions: Vec<Partition>,
}

impl MessageQueue {
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let partitions = (0..count)
            .map(|_| {
                let (tx, rx) = mpsc::channel(PARTITION_CAPACITY);
                Partition {
                    tx,
                    rx: Mutex::new(rx),
                }
            })
            .collect();

        Self { partitions }
    }

    pub fn partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Enqueues a descriptor, picking a uniformly random partition when none
    /// is given. Waits when the partition is full (backpressure, no drops).
    pub async fn put(&self, message: MessageFormat, partition: Option<usize>) -> Result<()> {
        let index = match partition {
            Some(index) => index % self.partitions.len(),
            None => rand::rng().random_range(0..self.partitions.len()),
        };

        self.partitions[index]
            .tx
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("message queue partition {index} closed"))
    }

    /// Awaits the next descriptor on the given partition.
    pub async fn get(&self, partition: usize) -> Option<MessageFormat> {
        let index = partition % self.partitions.len();
        gauge!("ct_queue_size", "index" => index.to_string()).set(self.size(index) as f64);

        self.partitions[index].rx.lock().await.recv().await
    }

    /// Observed depth of a partition.
    pub fn size(&self, partition: usize) -> usize {
        let tx = &self.partitions[partition % self.partitions.len()].tx;
        tx.max_capacity() - tx.capacity()
    }
}
