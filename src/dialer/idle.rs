use crate::Conn;

/// Idle connections to one address.
///
/// Connections are handed out in no particular order: taking one swaps the
/// last entry into its slot, so removal is O(1). Nothing checks whether an
/// idle connection is still open.
#[derive(Debug, Default)]
pub(super) struct IdleConnections {
    inner: Vec<Conn>,
}

impl IdleConnections {
    pub(super) fn push(&mut self, conn: Conn) {
        self.inner.push(conn);
    }

    pub(super) fn pop(&mut self) -> Option<Conn> {
        if self.inner.is_empty() {
            None
        } else {
            Some(self.inner.swap_remove(0))
        }
    }

    pub(super) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn conn() -> Conn {
        let (client, _) = tokio::io::duplex(16);
        Conn::new(client)
    }

    #[test]
    fn verify_idle_connections() {
        let mut idle = IdleConnections::default();
        assert_eq!(idle.len(), 0);
        assert!(idle.is_empty());
        assert!(idle.pop().is_none());

        let conn = conn();
        let id = conn.id();
        idle.push(conn);
        assert_eq!(idle.len(), 1);
        assert!(!idle.is_empty());

        assert_eq!(idle.pop().map(|c| c.id()), Some(id));
        assert!(idle.is_empty());
    }

    #[test]
    fn pop_swaps_last_into_first() {
        let mut idle = IdleConnections::default();

        let conns = [conn(), conn(), conn()];
        let ids: Vec<_> = conns.iter().map(|c| c.id()).collect();
        for conn in conns {
            idle.push(conn);
        }

        assert_eq!(idle.pop().map(|c| c.id()), Some(ids[0]));
        assert_eq!(idle.pop().map(|c| c.id()), Some(ids[2]));
        assert_eq!(idle.pop().map(|c| c.id()), Some(ids[1]));
        assert!(idle.pop().is_none());
    }

    #[test]
    fn each_connection_is_handed_out_once() {
        let mut idle = IdleConnections::default();
        for _ in 0..5 {
            idle.push(conn());
        }

        let mut seen = Vec::new();
        while let Some(conn) = idle.pop() {
            assert!(!seen.contains(&conn.id()));
            seen.push(conn.id());
        }
        assert_eq!(seen.len(), 5);
    }
}
