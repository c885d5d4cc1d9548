//! In-memory RMI device used by unit tests: a flat 64 KiB register map that
//! answers write and read-address reports the way the touchpad firmware does.

use super::{RmiTransport, INPUT_TRANSACTION_LEN, OUTPUT_HEADER_LEN, OUTPUT_REGISTER};
use crate::rmi::protocol::{
    PAGE_SELECT_REGISTER, READ_ADDR_REPORT_ID, READ_DATA_REPORT_ID, WRITE_REPORT_ID,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

struct MockState {
    registers: Vec<u8>,
    page: Option<u8>,
    page_selects: Vec<u8>,
    page_faults: usize,
    commands: Vec<(u8, Vec<u8>)>,
    pending_read: Option<[u8; INPUT_TRANSACTION_LEN]>,
    inputs: VecDeque<[u8; INPUT_TRANSACTION_LEN]>,
    read_data_id: u8,
    failing: bool,
}

pub struct MockTransport {
    state: RefCell<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState {
                registers: vec![0; 0x10000],
                page: None,
                page_selects: Vec::new(),
                page_faults: 0,
                commands: Vec::new(),
                pending_read: None,
                inputs: VecDeque::new(),
                read_data_id: READ_DATA_REPORT_ID,
                failing: false,
            }),
        }
    }

    pub fn set_register(&self, addr: u16, value: u8) {
        self.state.borrow_mut().registers[addr as usize] = value;
    }

    pub fn set_block(&self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.state.borrow_mut().registers[start..start + data.len()].copy_from_slice(data);
    }

    pub fn register(&self, addr: u16) -> u8 {
        self.state.borrow().registers[addr as usize]
    }

    pub fn commands(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.borrow().commands.clone()
    }

    pub fn page_selects(&self) -> Vec<u8> {
        self.state.borrow().page_selects.clone()
    }

    /// Register accesses made while a different page was selected.
    pub fn page_faults(&self) -> usize {
        self.state.borrow().page_faults
    }

    /// Answer read requests with `id` instead of the read-data report id.
    pub fn respond_with_id(&self, id: u8) {
        self.state.borrow_mut().read_data_id = id;
    }

    pub fn fail_io(&self) {
        self.state.borrow_mut().failing = true;
    }

    /// Queue a raw 40-byte RMI report as the next input transaction.
    pub fn push_input(&self, report: &[u8]) {
        let mut tx = [0u8; INPUT_TRANSACTION_LEN];
        tx[..2].copy_from_slice(&(INPUT_TRANSACTION_LEN as u16).to_le_bytes());
        tx[2..2 + report.len()].copy_from_slice(report);
        self.state.borrow_mut().inputs.push_back(tx);
    }
}

impl MockState {
    fn check_page(&mut self, addr: u16) {
        if self.page != Some((addr >> 8) as u8) {
            self.page_faults += 1;
        }
    }

    fn handle_report(&mut self, report: &[u8]) {
        let addr = u16::from_le_bytes([report[2], report[3]]);
        match report[0] {
            WRITE_REPORT_ID => {
                let len = report[1] as usize;
                if addr == PAGE_SELECT_REGISTER {
                    self.page = Some(report[4]);
                    self.page_selects.push(report[4]);
                    return;
                }
                self.check_page(addr);
                let start = addr as usize;
                self.registers[start..start + len].copy_from_slice(&report[4..4 + len]);
            }
            READ_ADDR_REPORT_ID => {
                self.check_page(addr);
                let len = u16::from_le_bytes([report[4], report[5]]) as usize;
                let mut tx = [0u8; INPUT_TRANSACTION_LEN];
                tx[..2].copy_from_slice(&(INPUT_TRANSACTION_LEN as u16).to_le_bytes());
                tx[2] = self.read_data_id;
                let start = addr as usize;
                tx[4..4 + len].copy_from_slice(&self.registers[start..start + len]);
                self.pending_read = Some(tx);
            }
            _ => {}
        }
    }
}

impl RmiTransport for MockTransport {
    fn write_command(&self, register: u8, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failing {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus gone"));
        }
        state.commands.push((register, buf.to_vec()));
        if register == OUTPUT_REGISTER {
            state.handle_report(&buf[OUTPUT_HEADER_LEN..]);
        }
        Ok(())
    }

    fn read_input(&self, buf: &mut [u8; INPUT_TRANSACTION_LEN]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failing {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus gone"));
        }
        let tx = match state.pending_read.take() {
            Some(tx) => tx,
            None => state.inputs.pop_front().ok_or_else(|| {
                io::Error::new(io::ErrorKind::TimedOut, "no input report from device")
            })?,
        };
        *buf = tx;
        Ok(())
    }
}
