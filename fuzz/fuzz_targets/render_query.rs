//! Fuzz harness for inline query rendering
//!
//! Any text argument rendered into a quoted literal must leave the query with
//! no unterminated literal.
//! Target: `roundlog_query::Query::render`

#![no_main]

use libfuzzer_sys::fuzz_target;
use roundlog_query::Query;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let rendered = Query::new("SELECT * FROM samples WHERE player_name = ?")
        .bind(text)
        .render();
    if let Ok(sql) = rendered {
        assert!(Query::new(sql).check().is_ok());
    }
});
