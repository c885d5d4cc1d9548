use super::protocol::RmiClient;
use super::RmiError;
use crate::transport::RmiTransport;

pub const PDT_ENTRY_LEN: usize = 6;
const PDT_START_SCAN_LOCATION: u16 = 0x00e9;
const PDT_END_SCAN_LOCATION: u16 = 0x0005;
const PAGE_SIZE: u16 = 0x0100;
pub const MAX_PAGE: u8 = 0xff;

pub const F01_DEVICE_CONTROL: u8 = 0x01;
pub const F11_2D_SENSOR: u8 = 0x11;
pub const F30_GPIO: u8 = 0x30;

const IRQ_COUNT_MASK: u8 = 0x07;
const FUNCTION_VERSION_SHIFT: u8 = 5;

/// Register layout of one function block, fixed after discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub number: u8,
    pub version: u8,
    pub page: u8,
    pub query_base: u16,
    pub command_base: u16,
    pub control_base: u16,
    pub data_base: u16,
    pub interrupt_base: u32,
    pub interrupt_count: u8,
    pub irq_mask: u32,
    /// Bytes this function contributes to an attention report.
    pub report_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdtEntry {
    pub query_base: u8,
    pub command_base: u8,
    pub control_base: u8,
    pub data_base: u8,
    pub interrupt_source_count: u8,
    pub function_version: u8,
    pub function_number: u8,
}

impl PdtEntry {
    pub fn parse(raw: &[u8; PDT_ENTRY_LEN]) -> Self {
        Self {
            query_base: raw[0],
            command_base: raw[1],
            control_base: raw[2],
            data_base: raw[3],
            interrupt_source_count: raw[4] & IRQ_COUNT_MASK,
            function_version: (raw[4] >> FUNCTION_VERSION_SHIFT) & 0x03,
            function_number: raw[5],
        }
    }

    pub fn is_end_of_table(&self) -> bool {
        self.function_number == 0x00 || self.function_number == 0xff
    }
}

/// Contiguous interrupt bits `[base, base + count)`; empty when count is 0.
pub fn irq_mask(base: u32, count: u8) -> u32 {
    let bits = (1u64 << count) - 1;
    bits.checked_shl(base).unwrap_or(0) as u32
}

#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    pub f01: Option<FunctionDescriptor>,
    pub f11: Option<FunctionDescriptor>,
    pub f30: Option<FunctionDescriptor>,
    pub interrupt_enable_mask: u32,
}

impl FunctionTable {
    fn register(&mut self, entry: &PdtEntry, page: u8, interrupt_base: u32) {
        let slot = match entry.function_number {
            F01_DEVICE_CONTROL => &mut self.f01,
            F11_2D_SENSOR => &mut self.f11,
            F30_GPIO => &mut self.f30,
            _ => return,
        };

        let page_base = u16::from(page) << 8;
        let irq_mask = irq_mask(interrupt_base, entry.interrupt_source_count);
        *slot = Some(FunctionDescriptor {
            number: entry.function_number,
            version: entry.function_version,
            page,
            query_base: page_base | u16::from(entry.query_base),
            command_base: page_base | u16::from(entry.command_base),
            control_base: page_base | u16::from(entry.control_base),
            data_base: page_base | u16::from(entry.data_base),
            interrupt_base,
            interrupt_count: entry.interrupt_source_count,
            irq_mask,
            report_size: 0,
        });
        self.interrupt_enable_mask |= irq_mask;
    }
}

/// Walk the page description table, page by page, until a page holds no
/// functions.
pub fn scan<T: RmiTransport>(client: &mut RmiClient<T>) -> Result<FunctionTable, RmiError> {
    let mut table = FunctionTable::default();
    let mut interrupt = 0u32;

    for page in 0..=MAX_PAGE {
        let page_start = u16::from(page) * PAGE_SIZE;
        let mut page_has_function = false;

        for offset in (PDT_END_SCAN_LOCATION..=PDT_START_SCAN_LOCATION)
            .rev()
            .step_by(PDT_ENTRY_LEN)
        {
            let mut raw = [0u8; PDT_ENTRY_LEN];
            client.read_block(page_start + offset, &mut raw)?;
            let entry = PdtEntry::parse(&raw);
            if entry.is_end_of_table() {
                break;
            }

            page_has_function = true;
            tracing::debug!(
                function = format!("F{:02X}", entry.function_number),
                page,
                irqs = entry.interrupt_source_count,
                "found RMI function"
            );
            table.register(&entry, page, interrupt);
            interrupt += u32::from(entry.interrupt_source_count);
        }

        if !page_has_function {
            break;
        }
    }

    tracing::debug!(
        interrupt_enable_mask = format!("0x{:02X}", table.interrupt_enable_mask),
        "PDT scan done"
    );
    Ok(table)
}
