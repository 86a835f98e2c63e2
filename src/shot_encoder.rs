use crate::Result;
use crate::timeline::Shot;

/// Streams shots to an output format, one at a time.
pub trait ShotEncoder {
    fn write_shot(&mut self, shot: &Shot) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
