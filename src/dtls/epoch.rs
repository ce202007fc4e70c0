use std::mem;

use crate::crypto::WriteCipher;
use crate::Error;

/// The current write cipher and the one it replaced.
///
/// The previous cipher stays around so a flight queued under the old epoch
/// can still be (re)sent after the switch.
#[derive(Debug)]
pub(crate) struct EpochCiphers {
    current: WriteCipher,
    previous: Option<WriteCipher>,
    write_epoch: u16,
}

impl EpochCiphers {
    pub fn new(initial: WriteCipher) -> Self {
        EpochCiphers {
            current: initial,
            previous: None,
            write_epoch: 0,
        }
    }

    #[inline(always)]
    pub fn write_epoch(&self) -> u16 {
        self.write_epoch
    }

    pub fn previous_epoch(&self) -> Option<u16> {
        self.previous.as_ref().map(|c| c.epoch())
    }

    pub fn current(&self) -> &WriteCipher {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut WriteCipher {
        &mut self.current
    }

    /// Install `next` as the cipher for the following epoch.
    ///
    /// The cipher from two epochs back is disposed.
    pub fn rotate(&mut self, mut next: WriteCipher) -> Result<(), Error> {
        let epoch = self.write_epoch.checked_add(1).ok_or(Error::WrappedEpoch)?;

        next.set_epoch(epoch);
        let archived = mem::replace(&mut self.current, next);
        if let Some(disposed) = self.previous.replace(archived) {
            disposed.dispose();
        }
        self.write_epoch = epoch;

        Ok(())
    }

    /// Cipher to protect a record queued in `epoch`.
    pub fn for_epoch_mut(&mut self, epoch: u16) -> Result<&mut WriteCipher, Error> {
        if epoch == self.write_epoch {
            return Ok(&mut self.current);
        }
        match &mut self.previous {
            Some(prev) if prev.epoch() == epoch => Ok(prev),
            _ => Err(Error::CipherUnavailable(epoch)),
        }
    }
}
