use merak_core::thread::ThreadStore;
use serde_json::json;

use crate::threads::FileThreadStore;

pub fn show(user_id: &str) -> i32 {
    let store = FileThreadStore::default_location();
    match store.read(user_id) {
        Ok(thread_id) => {
            let out = json!({ "user_id": user_id, "thread_id": thread_id });
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
            0
        }
        Err(err) => {
            eprintln!(
                "{}",
                json!({ "error": "thread_store_error", "message": err.to_string() })
            );
            1
        }
    }
}

pub fn clear(user_id: &str) -> i32 {
    let store = FileThreadStore::default_location();
    match store.write(user_id, None) {
        Ok(()) => {
            println!("{}", json!({ "user_id": user_id, "thread_id": null }));
            0
        }
        Err(err) => {
            eprintln!(
                "{}",
                json!({ "error": "thread_store_error", "message": err.to_string() })
            );
            1
        }
    }
}
