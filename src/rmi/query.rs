use super::protocol::RmiClient;
use super::RmiError;
use crate::transport::RmiTransport;

/// Sequential reader over a function's query registers.
///
/// Optional query blocks are only present when an earlier capability bit
/// says so, so the cursor advances by explicit widths as each bit is parsed.
#[derive(Debug, Clone, Copy)]
pub struct QueryCursor {
    base: u16,
    offset: u16,
}

impl QueryCursor {
    pub fn new(base: u16) -> Self {
        Self { base, offset: 0 }
    }

    pub fn at(base: u16, offset: u16) -> Self {
        Self { base, offset }
    }

    pub fn addr(&self) -> u16 {
        self.base.wrapping_add(self.offset)
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn skip(&mut self, n: u16) {
        self.offset += n;
    }

    pub fn skip_if(&mut self, present: bool, n: u16) {
        if present {
            self.skip(n);
        }
    }

    /// Read the register `ahead` bytes past the cursor without moving it.
    pub fn peek<T: RmiTransport>(
        &self,
        client: &mut RmiClient<T>,
        ahead: u16,
    ) -> Result<u8, RmiError> {
        client.read_byte(self.addr().wrapping_add(ahead))
    }

    pub fn read_byte<T: RmiTransport>(&self, client: &mut RmiClient<T>) -> Result<u8, RmiError> {
        self.peek(client, 0)
    }

    pub fn read_block<T: RmiTransport>(
        &self,
        client: &mut RmiClient<T>,
        buf: &mut [u8],
    ) -> Result<(), RmiError> {
        client.read_block(self.addr(), buf)
    }
}

pub fn has(byte: u8, mask: u8) -> bool {
    byte & mask != 0
}
