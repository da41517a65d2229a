#![no_main]

use libfuzzer_sys::fuzz_target;
use partial_ranker::rank_table::RankTable;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing arbitrary text must never panic
        if let Ok(table) = RankTable::from_csv(input) {
            // Anything accepted must re-parse to the same table
            let reparsed = RankTable::from_csv(&table.to_csv());
            assert_eq!(reparsed.ok(), Some(table));
        }
    }
});
