use std::{
    collections::HashMap,
    io::{Read, SeekFrom},
    path::Path,
    sync::Mutex,
};

use log::debug;

use crate::{
    io::{read_exact, Decodeable, Encodeable, StoreFile},
    storage::heap::{HeapPageID, Page},
    transaction::{Transaction, TransactionID},
    types::{Pod, StoreResult},
    utils::HandyRwLock,
};

#[derive(Debug, PartialEq, Clone, Copy)]
enum RecordType {
    ABORT,
    COMMIT,
    UPDATE,
    START,
}

impl RecordType {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RecordType::ABORT,
            1 => RecordType::COMMIT,
            2 => RecordType::UPDATE,
            3 => RecordType::START,
            _ => panic!("invalid record type: {}", value),
        }
    }
}

impl Encodeable for RecordType {
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for RecordType {
    fn read_from<R: Read>(reader: &mut R) -> Self {
        let value = read_exact(reader, 1);
        RecordType::from_u8(value[0])
    }
}

struct LogState {
    /// Record the start position of each live transaction, dropped on
    /// COMMIT/ABORT.
    tx_start_position: HashMap<TransactionID, u64>,

    file: StoreFile,

    /// The absolute position of the file descriptor cursor.
    current_offset: u64,

    total_records: usize,
}

/// The write-ahead log.
///
/// Record format: a one-byte record type, the transaction id, a
/// type-specific payload, and the offset of the previous record. UPDATE
/// records carry the page id plus the length-prefixed before and after
/// images; they are what make stealing dirty pages and NO-FORCE commits
/// recoverable by an external recovery manager. There is no
/// checkpointing and no replay here.
pub struct LogManager {
    state: Mutex<LogState>,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let mut file = StoreFile::new(file_path);

        let size = file.get_size().unwrap();
        file.seek(SeekFrom::End(0)).unwrap();

        Self {
            state: Mutex::new(LogState {
                tx_start_position: HashMap::new(),
                file,

                // init current_offset to the end of the file
                current_offset: size,

                total_records: 0,
            }),
        }
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();

        state.file.set_len(0).unwrap();
        state.file.seek(SeekFrom::Start(0)).unwrap();
        state.tx_start_position.clear();
        state.current_offset = 0;
        state.total_records = 0;
    }

    pub fn records_count(&self) -> usize {
        self.state.lock().unwrap().total_records
    }

    pub fn log_start(&self, tx: &Transaction) -> StoreResult {
        let mut state = self.state.lock().unwrap();

        state.file.write(&RecordType::START)?;
        state.file.write(&tx.get_id())?;
        let prev_offset = state.current_offset;
        state.file.write(&prev_offset)?;

        state.tx_start_position.insert(tx.get_id(), prev_offset);
        state.current_offset = state.file.get_current_position()?;
        state.total_records += 1;

        Ok(())
    }

    /// Write an UPDATE record for the page, with its before and after
    /// images.
    pub fn log_update<PAGE: Page>(&self, tx: &Transaction, page_pod: &Pod<PAGE>) -> StoreResult {
        let mut state = self.state.lock().unwrap();

        let page = page_pod.rl();

        state.file.write(&RecordType::UPDATE)?;
        state.file.write(&tx.get_id())?;
        state.file.write(&page.get_pid())?;

        let before_data = page.get_before_image();
        state.file.write(&before_data.len())?;
        state.file.write(before_data.as_slice())?;

        let after_data = page.get_page_data();
        state.file.write(&after_data.len())?;
        state.file.write(after_data.as_slice())?;

        let prev_offset = state.current_offset;
        state.file.write(&prev_offset)?;

        state.current_offset = state.file.get_current_position()?;
        state.total_records += 1;

        debug!("log update, tx: {}, pid: {:?}", tx, page.get_pid());
        Ok(())
    }

    pub fn log_commit(&self, tx: &Transaction) -> StoreResult {
        let mut state = self.state.lock().unwrap();

        state.file.write(&RecordType::COMMIT)?;
        state.file.write(&tx.get_id())?;
        let prev_offset = state.current_offset;
        state.file.write(&prev_offset)?;

        state.current_offset = state.file.get_current_position()?;
        state.total_records += 1;
        state.tx_start_position.remove(&tx.get_id());

        Ok(())
    }

    pub fn log_abort(&self, tx: &Transaction) -> StoreResult {
        let mut state = self.state.lock().unwrap();

        state.file.write(&RecordType::ABORT)?;
        state.file.write(&tx.get_id())?;
        let prev_offset = state.current_offset;
        state.file.write(&prev_offset)?;

        state.current_offset = state.file.get_current_position()?;
        state.total_records += 1;
        state.tx_start_position.remove(&tx.get_id());

        Ok(())
    }

    /// Flush the log buffers down to durable storage. Log precedence:
    /// this runs before any dirty page reaches the table file, and
    /// before the latches of a committing transaction are released.
    pub fn force(&self) -> StoreResult {
        self.state.lock().unwrap().file.sync()
    }

    /// Dump the log records through `debug!`.
    pub fn show_log_contents(&self) {
        let mut state = self.state.lock().unwrap();

        let end = state.current_offset;
        let mut depiction = String::new();

        state.file.seek(SeekFrom::Start(0)).unwrap();

        let mut offset = 0;
        let mut record_id = -1;
        while offset < end {
            record_id += 1;

            let record_type = match state.file.read::<RecordType>() {
                Ok(t) => t,
                Err(_) => break,
            };
            depiction.push_str(&format!(
                "├── {:?}-[pos {}]-[record {}]\n",
                record_type, offset, record_id,
            ));

            let tid = state.file.read::<u64>().unwrap();
            depiction.push_str(&format!("│   ├── tid: {}\n", tid));

            if record_type == RecordType::UPDATE {
                let pid = state.file.read::<HeapPageID>().unwrap();
                depiction.push_str(&format!("│   ├── pid: {:?}\n", pid));

                let before_page = state.file.read_blob().unwrap();
                depiction.push_str(&format!(
                    "│   ├── [{} bytes] before page: {}...\n",
                    before_page.len(),
                    hex::encode(&before_page[..16.min(before_page.len())]),
                ));

                let after_page = state.file.read_blob().unwrap();
                depiction.push_str(&format!(
                    "│   ├── [{} bytes] after page: {}...\n",
                    after_page.len(),
                    hex::encode(&after_page[..16.min(after_page.len())]),
                ));
            }

            let prev_offset = state.file.read::<u64>().unwrap();
            depiction.push_str(&format!("│   └── previous offset: {}\n", prev_offset));

            offset = state.file.get_current_position().unwrap();
        }

        state.file.seek(SeekFrom::End(0)).unwrap();

        debug!("log content: \n{}", depiction);
    }
}
