use std::sync::Arc;

use strata::buffer::BufferPoolManager;
use strata::storage::disk::DiskManager;
use strata::Trie;

fn main() {
    println!("Strata - disk-oriented storage core");
    println!("===================================\n");

    let db_path = "demo.db";

    let disk = Arc::new(DiskManager::new(db_path).expect("Failed to open database file"));
    println!("Opened database file: {}", db_path);

    // Buffer pool with 10 frames and LRU-2 replacement
    let bpm = BufferPoolManager::new(10, disk, 2, None);
    println!("Created buffer pool with {} frames\n", bpm.pool_size());

    // Allocate a page and write through a write guard
    let page_id = {
        let mut guard = bpm
            .new_page_guarded()
            .expect("Failed to allocate page")
            .expect("Pool exhausted");
        let page_id = guard.page_id();
        let message = b"Hello from the buffer pool!";
        guard.data_mut()[..message.len()].copy_from_slice(message);
        println!("Wrote {} bytes into {}", message.len(), page_id);
        page_id
    };

    bpm.flush_page(page_id).expect("Failed to flush page");
    println!("Flushed {} to disk", page_id);

    // Read it back through a read guard
    {
        let guard = bpm
            .fetch_page_read(page_id)
            .expect("Failed to fetch page")
            .expect("Pool exhausted");
        let text = String::from_utf8_lossy(&guard.data()[..27]);
        println!("Read back: {:?}\n", text);
    }

    // The trie keeps every version alive
    let t0 = Trie::new();
    let t1 = t0.put("ab", 1u32);
    let t2 = t1.put("ac", 2u32);
    let t3 = t2.remove("ab");

    println!("Trie versions:");
    println!("  t1[ab] = {:?}", t1.get::<u32>("ab"));
    println!("  t2[ab] = {:?}  t2[ac] = {:?}", t2.get::<u32>("ab"), t2.get::<u32>("ac"));
    println!("  t3[ab] = {:?}  t3[ac] = {:?}", t3.get::<u32>("ab"), t3.get::<u32>("ac"));

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
