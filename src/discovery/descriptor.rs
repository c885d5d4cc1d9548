use crate::rmi::protocol::{ATTN_REPORT_ID, WRITE_REPORT_ID};

const TAG_INPUT: u8 = 0x80;
const TAG_OUTPUT: u8 = 0x90;
const TAG_FEATURE: u8 = 0xb0;
const TAG_REPORT_ID: u8 = 0x84;
const LONG_ITEM: u8 = 0xfe;

/// Report ids a HID report descriptor declares, by main item kind.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReportIds {
    pub input: Vec<u8>,
    pub output: Vec<u8>,
    pub feature: Vec<u8>,
}

impl ReportIds {
    /// The interface speaks RMI: attention reports in, register writes out.
    pub fn is_rmi(&self) -> bool {
        self.input.contains(&ATTN_REPORT_ID) && self.output.contains(&WRITE_REPORT_ID)
    }
}

fn push_unique(ids: &mut Vec<u8>, id: u8) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// Walk the short items of a report descriptor, tracking the current report
/// id through each Input/Output/Feature item.
pub fn report_ids(desc: &[u8]) -> ReportIds {
    let mut ids = ReportIds::default();
    let mut current: Option<u8> = None;
    let mut i = 0;

    while i < desc.len() {
        let prefix = desc[i];

        if prefix == LONG_ITEM {
            let Some(&data_size) = desc.get(i + 1) else {
                break;
            };
            i += 3 + data_size as usize;
            continue;
        }

        let size = [0, 1, 2, 4][(prefix & 0x03) as usize];
        let Some(data) = desc.get(i + 1..i + 1 + size) else {
            break;
        };

        match prefix & 0xfc {
            TAG_REPORT_ID => current = data.first().copied(),
            TAG_INPUT => {
                if let Some(id) = current {
                    push_unique(&mut ids.input, id);
                }
            }
            TAG_OUTPUT => {
                if let Some(id) = current {
                    push_unique(&mut ids.output, id);
                }
            }
            TAG_FEATURE => {
                if let Some(id) = current {
                    push_unique(&mut ids.feature, id);
                }
            }
            _ => {}
        }

        i += 1 + size;
    }

    ids
}
