//! Messages which carry built tiles from a worker to the thread that uploads them.

use std::sync::mpsc;

use thiserror::Error;

use crate::{coords::OverscaledTileId, worker::TileBuckets};

#[derive(Error, Debug)]
pub enum WorkerError {
    /// The receiving end is gone
    #[error("sending data back through context failed")]
    Send,
}

#[derive(Debug)]
pub enum Message {
    TileBuilt(TileBuckets),
    /// Building the tile failed. The tile is not retried.
    TileFailed {
        tile_id: OverscaledTileId,
        error: String,
    },
}

impl Message {
    pub fn tile_id(&self) -> OverscaledTileId {
        match self {
            Message::TileBuilt(built) => built.tile_id,
            Message::TileFailed { tile_id, .. } => *tile_id,
        }
    }
}

pub trait Context {
    fn send(&self, message: Message) -> Result<(), WorkerError>;
}

impl Context for mpsc::Sender<Message> {
    fn send(&self, message: Message) -> Result<(), WorkerError> {
        mpsc::Sender::send(self, message).map_err(|_| WorkerError::Send)
    }
}
