//! Bounded close.
//!
//! A lingering close waits at most [`Config::linger`](crate::Config::linger)
//! for the engine lock, then tries to get the last records (typically a
//! close_notify alert) onto the wire. If that does not work out the session is
//! invalidated instead of failing the close.

use crate::buffer::Buf;
use crate::dtls::DtlsOutputRecord;
use crate::record::RecordSink;
use crate::tls::TlsOutputRecord;
use crate::transcript::TranscriptSink;

/// Session cache hook.
pub trait SessionControl {
    /// Mark the session as not resumable.
    fn invalidate(&self);
}

/// How a lingering close ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing was left to send.
    Closed,
    /// This many final records were written before closing.
    Drained(usize),
    /// The lock or the final write did not succeed in time. The session was
    /// invalidated.
    Abandoned,
}

impl<T: TranscriptSink> DtlsOutputRecord<T> {
    /// Close, writing any pending alert records to `sink`.
    pub fn linger_close<K: RecordSink + ?Sized>(
        &self,
        sink: &mut K,
        session: &dyn SessionControl,
    ) -> CloseOutcome {
        let linger = self.config().linger();

        let Some(mut inner) = self.inner.try_lock_for(linger) else {
            warn!("Close could not get the record lock within {:?}", linger);
            session.invalidate();
            return CloseOutcome::Abandoned;
        };

        inner.close();

        // Once fully closed nothing more goes out.
        let mut drained = 0;
        let mut dst = Buf::new();
        while inner.is_close_waiting() {
            dst.clear();
            match inner.encode(&mut [], &mut dst) {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    warn!("Close failed to drain pending records: {}", e);
                    session.invalidate();
                    return CloseOutcome::Abandoned;
                }
            }
            if let Err(e) = sink.write_record(&dst) {
                warn!("Close failed to deliver final record: {}", e);
                session.invalidate();
                return CloseOutcome::Abandoned;
            }
            drained += 1;
        }

        if drained > 0 {
            if let Err(e) = sink.flush() {
                warn!("Close failed to flush: {}", e);
                session.invalidate();
                return CloseOutcome::Abandoned;
            }
            return CloseOutcome::Drained(drained);
        }

        CloseOutcome::Closed
    }
}

impl<S: RecordSink, T: TranscriptSink> TlsOutputRecord<S, T> {
    /// Close, flushing pending handshake bytes within the linger bound.
    pub fn linger_close(&self, session: &dyn SessionControl) -> CloseOutcome {
        let linger = self.config().linger();

        let Some(mut inner) = self.inner.try_lock_for(linger) else {
            warn!("Close could not get the record lock within {:?}", linger);
            session.invalidate();
            return CloseOutcome::Abandoned;
        };

        match inner.close() {
            Ok(()) => CloseOutcome::Closed,
            Err(e) => {
                warn!("Close failed to flush: {}", e);
                session.invalidate();
                CloseOutcome::Abandoned
            }
        }
    }
}
