//! Walks through the ordered map: insertion order, the two removal flavors,
//! and a serialize/reload round trip.

use std::io::Cursor;

use ordered_hash::DefaultHashBuilder;
use ordered_hash::OrderedMap;

fn main() -> Result<(), ordered_hash::Error> {
    let mut map: OrderedMap<String, u64> = OrderedMap::new();
    for (name, population) in [
        ("tokyo", 37_400_000u64),
        ("delhi", 31_000_000),
        ("shanghai", 27_800_000),
        ("sao paulo", 22_400_000),
    ] {
        map.insert(name.to_string(), population)?;
    }

    println!("insertion order:");
    for (index, (name, population)) in map.iter().enumerate() {
        println!("  {index}: {name} ({population})");
    }

    map.shift_remove("delhi");
    println!("\nafter shift_remove(\"delhi\") the order is preserved:");
    for name in map.keys() {
        println!("  {name}");
    }

    map.swap_remove("tokyo");
    println!("\nafter swap_remove(\"tokyo\") the last entry fills the hole:");
    for name in map.keys() {
        println!("  {name}");
    }

    let mut bytes = Vec::new();
    map.serialize_into(&mut bytes)?;
    println!("\nserialized {} entries into {} bytes", map.len(), bytes.len());

    let reloaded: OrderedMap<String, u64, DefaultHashBuilder> =
        OrderedMap::deserialize_from(&mut Cursor::new(&bytes), false)?;
    println!("reloaded in the same order:");
    for (name, population) in reloaded.iter() {
        println!("  {name} ({population})");
    }

    Ok(())
}
