use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

use crate::common::{DbError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// A queued disk I/O request. Requests own their page buffers, so they can
/// cross the channel without lifetime ties to the caller.
enum DiskRequest {
    Read {
        page_id: PageId,
        reply: std::sync::mpsc::Sender<Result<Box<[u8; PAGE_SIZE]>>>,
    },
    Write {
        page_id: PageId,
        data: Box<[u8; PAGE_SIZE]>,
        reply: std::sync::mpsc::Sender<Result<()>>,
    },
}

/// DiskScheduler funnels page I/O through a background worker thread fed by
/// a bounded queue. The buffer pool uses the synchronous wrappers; the queue
/// exists so that all file access is serialized in one place.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Option<Sender<DiskRequest>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);

        let dm = Arc::clone(&disk_manager);
        let worker_handle = thread::spawn(move || {
            while let Ok(request) = receiver.recv() {
                match request {
                    DiskRequest::Read { page_id, reply } => {
                        let mut buf = Box::new([0u8; PAGE_SIZE]);
                        let result = dm.read_page(page_id, &mut buf[..]).map(|_| buf);
                        let _ = reply.send(result);
                    }
                    DiskRequest::Write {
                        page_id,
                        data,
                        reply,
                    } => {
                        let _ = reply.send(dm.write_page(page_id, &data[..]));
                    }
                }
            }
        });

        Self {
            disk_manager,
            request_sender: Some(sender),
            worker_handle: Some(worker_handle),
        }
    }

    /// Reads a page through the worker, blocking until it completes.
    pub fn read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = std::sync::mpsc::channel();
        self.send(DiskRequest::Read { page_id, reply: tx })?;
        let buf = rx
            .recv()
            .map_err(|e| DbError::DiskScheduler(format!("worker dropped read reply: {e}")))??;
        data.copy_from_slice(&buf[..]);
        Ok(())
    }

    /// Writes a page through the worker, blocking until it completes.
    pub fn write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let mut buf = Box::new([0u8; PAGE_SIZE]);
        buf.copy_from_slice(data);

        let (tx, rx) = std::sync::mpsc::channel();
        self.send(DiskRequest::Write {
            page_id,
            data: buf,
            reply: tx,
        })?;
        rx.recv()
            .map_err(|e| DbError::DiskScheduler(format!("worker dropped write reply: {e}")))?
    }

    fn send(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .as_ref()
            .expect("scheduler is running")
            .send(request)
            .map_err(|e| DbError::DiskScheduler(format!("failed to queue request: {e}")))
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.request_sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_roundtrip() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let scheduler = DiskScheduler::new(Arc::clone(&dm));

        let page_id = dm.allocate_page().unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[10] = 200;
        scheduler.write_sync(page_id, &data).unwrap();

        let mut read_back = [0u8; PAGE_SIZE];
        scheduler.read_sync(page_id, &mut read_back).unwrap();
        assert_eq!(read_back[10], 200);
    }

    #[test]
    fn test_scheduler_many_requests() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let scheduler = DiskScheduler::new(Arc::clone(&dm));

        let mut ids = Vec::new();
        for i in 0..50u8 {
            let page_id = dm.allocate_page().unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = i;
            scheduler.write_sync(page_id, &data).unwrap();
            ids.push((page_id, i));
        }

        for (page_id, value) in ids {
            let mut data = [0u8; PAGE_SIZE];
            scheduler.read_sync(page_id, &mut data).unwrap();
            assert_eq!(data[0], value);
        }
    }
}
