//! Player Links
//!
//! The tick driver's view of a connection: a pair of bounded queues it
//! polls without ever blocking. The transport pumps own the other ends.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Result of polling a link for an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    /// A complete frame.
    Frame(Vec<u8>),
    /// Nothing available right now.
    Empty,
    /// The connection is gone.
    Closed,
}

/// Why an outbound frame was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue full")]
    Full,
    #[error("connection closed")]
    Closed,
}

/// Non-blocking duplex queue to one player.
pub trait Link {
    /// Take the next inbound frame if one is ready.
    fn try_recv(&mut self) -> Recv;

    /// Queue an outbound frame without waiting.
    fn try_send(&mut self, frame: Vec<u8>) -> Result<(), SendError>;
}

/// [`Link`] over a pair of tokio mpsc channels.
///
/// Dropping it closes the outbound queue, which tells the write pump to
/// close the connection.
#[derive(Debug)]
pub struct ChannelLink {
    inbound: mpsc::Receiver<Vec<u8>>,
    outbound: mpsc::Sender<Vec<u8>>,
}

/// Transport side of a [`ChannelLink`].
#[derive(Debug)]
pub struct RemoteEnd {
    /// Read pump pushes received frames here.
    pub inbound: mpsc::Sender<Vec<u8>>,
    /// Write pump drains frames to send from here.
    pub outbound: mpsc::Receiver<Vec<u8>>,
}

impl ChannelLink {
    /// Create a link and its transport side with the given queue capacities.
    pub fn pair(inbound_capacity: usize, outbound_capacity: usize) -> (ChannelLink, RemoteEnd) {
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
        (
            ChannelLink { inbound: inbound_rx, outbound: outbound_tx },
            RemoteEnd { inbound: inbound_tx, outbound: outbound_rx },
        )
    }
}

impl Link for ChannelLink {
    fn try_recv(&mut self) -> Recv {
        match self.inbound.try_recv() {
            Ok(frame) => Recv::Frame(frame),
            Err(TryRecvError::Empty) => Recv::Empty,
            Err(TryRecvError::Disconnected) => Recv::Closed,
        }
    }

    fn try_send(&mut self, frame: Vec<u8>) -> Result<(), SendError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_link_frames() {
        let (mut link, mut remote) = ChannelLink::pair(2, 2);
        assert_eq!(link.try_recv(), Recv::Empty);

        remote.inbound.send(vec![1, 2]).await.unwrap();
        assert_eq!(link.try_recv(), Recv::Frame(vec![1, 2]));

        link.try_send(vec![9]).unwrap();
        assert_eq!(remote.outbound.recv().await, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_full_and_closed() {
        let (mut link, remote) = ChannelLink::pair(1, 1);
        link.try_send(vec![0]).unwrap();
        assert_eq!(link.try_send(vec![1]), Err(SendError::Full));

        drop(remote);
        assert_eq!(link.try_recv(), Recv::Closed);
        assert_eq!(link.try_send(vec![2]), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_dropping_link_closes_outbound() {
        let (link, mut remote) = ChannelLink::pair(1, 1);
        drop(link);
        assert_eq!(remote.outbound.recv().await, None);
        assert!(remote.inbound.send(vec![1]).await.is_err());
    }
}
