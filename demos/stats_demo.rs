use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use ordered_hash::HashTable;
use ordered_hash::hash_table::Entry;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Percentage of the inserted values to remove before printing stats a
    /// second time.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 25)]
    remove_percent: u8,

    /// Start from the default 64-slot table and let it grow.
    #[arg(long = "grow", default_value_t = false)]
    grow: bool,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64> = if args.grow {
        HashTable::new()
    } else {
        HashTable::with_capacity(args.target_capacity)
    };

    println!("Initial slots: {}", table.capacity());
    println!("Filling table with u64 values...");

    let mut growths = 0;
    for i in 0..args.target_capacity {
        let value = i as u64;
        let hash = hash_u64(value);
        let slots = table.capacity();

        match table.entry(hash, |&v| v == value) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => {
                panic!("Value already exists in table: {}", value);
            }
        }

        if table.capacity() != slots {
            growths += 1;
        }
    }

    println!(
        "Inserted {} values into {} slots ({} growths)",
        table.len(),
        table.capacity(),
        growths
    );
    println!(
        "Final load factor: {:.2}%",
        (table.len() as f64 / table.capacity() as f64) * 100.0
    );

    table.probe_histogram().print();
    table.debug_stats().print();

    let remove_percent = usize::from(args.remove_percent.min(100));
    let to_remove = args.target_capacity * remove_percent / 100;
    if to_remove == 0 {
        return;
    }

    let mut removed = 0;
    for i in (0..args.target_capacity).step_by(100 / remove_percent.max(1)) {
        let value = i as u64;
        if table.remove(hash_u64(value), |&v| v == value).is_some() {
            removed += 1;
        }
        if removed == to_remove {
            break;
        }
    }

    println!();
    println!("Removed {} values with backward shifting", removed);
    table.probe_histogram().print();
    table.debug_stats().print();
}
