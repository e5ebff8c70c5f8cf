//! Tests for the span-indexed hash walk: QHash, QMultiHash, QSet.

mod common;

use common::{ty_int, Fixture, HashFixture};
use qspect_core::{Catalogue, MemoryAccess, TypeDesc, TypedRef};

fn qhash_int_int() -> TypeDesc
{
    TypeDesc::with_args("QHash<int,int>", 8, 8, vec![ty_int(), ty_int()])
}

fn qmultihash_int_int() -> TypeDesc
{
    TypeDesc::with_args("QMultiHash<int,int>", 16, 8, vec![ty_int(), ty_int()])
}

fn qset_int() -> TypeDesc
{
    TypeDesc::with_args("QSet<int>", 8, 8, vec![ty_int()])
}

#[test]
fn test_empty_hash_reports_size_zero()
{
    let mut f = Fixture::new();
    let handle = f.alloc(8, 8); // null data pointer

    let catalogue = Catalogue::qt6();
    let rendered = catalogue.decode(&f.mem, &TypedRef::new(handle, qhash_int_int())).unwrap();
    assert_eq!(rendered.display, "QHash<int, int> (size = 0)");
    assert_eq!(rendered.num_children, Some(0));
    assert!(rendered.collect_children().is_empty());
}

#[test]
fn test_hash_yields_entries_in_bucket_order()
{
    let mut f = Fixture::new();
    // {i32, i32} entries: value at +4, stride 8.
    let mut table = HashFixture::new(&mut f, 256, 8, 8);

    // Deliberately inserted out of bucket order; the walk must not care.
    for (bucket, key, value) in [(130u64, 3i32, 30i32), (5, 1, 10), (70, 2, 20)] {
        let entry = table.occupy(&mut f, bucket);
        f.mem.poke_i32(entry, key);
        f.mem.poke_i32(entry + 4, value);
    }
    let handle = table.handle(&mut f);

    let catalogue = Catalogue::qt6();
    let rendered = catalogue.decode(&f.mem, &TypedRef::new(handle, qhash_int_int())).unwrap();
    assert_eq!(rendered.display, "QHash<int, int> (size = 3)");
    assert_eq!(rendered.num_children, Some(6));

    let children = rendered.collect_children();
    assert_eq!(children.len(), 6);

    // Flattened (key, value) stream in bucket order, labelled by running index.
    let decoded: Vec<i32> = children.iter().map(|c| f.mem.read_i32(c.value.addr).unwrap()).collect();
    assert_eq!(decoded, vec![1, 10, 2, 20, 3, 30]);
    let labels: Vec<&str> = children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["0", "1", "2", "3", "4", "5"]);

    // Yielded pair count equals the reported live-entry count.
    assert_eq!(children.len(), 2 * 3);
}

#[test]
fn test_hash_keys_are_unique()
{
    let mut f = Fixture::new();
    let mut table = HashFixture::new(&mut f, 128, 8, 8);
    for (bucket, key) in [(0u64, 11i32), (1, 22), (127, 33)] {
        let entry = table.occupy(&mut f, bucket);
        f.mem.poke_i32(entry, key);
        f.mem.poke_i32(entry + 4, key * 10);
    }
    let handle = table.handle(&mut f);

    let catalogue = Catalogue::qt6();
    let rendered = catalogue.decode(&f.mem, &TypedRef::new(handle, qhash_int_int())).unwrap();
    let children = rendered.collect_children();

    let mut keys: Vec<i32> = children
        .iter()
        .step_by(2)
        .map(|c| f.mem.read_i32(c.value.addr).unwrap())
        .collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), 3);
}

#[test]
fn test_hash_decode_is_idempotent()
{
    let mut f = Fixture::new();
    let mut table = HashFixture::new(&mut f, 128, 8, 8);
    let entry = table.occupy(&mut f, 42);
    f.mem.poke_i32(entry, 7);
    f.mem.poke_i32(entry + 4, 70);
    let handle = table.handle(&mut f);

    let catalogue = Catalogue::qt6();
    let value = TypedRef::new(handle, qhash_int_int());

    let first = catalogue.decode(&f.mem, &value).unwrap();
    let first_children = first.collect_children();
    let second = catalogue.decode(&f.mem, &value).unwrap();
    assert_eq!(second.display, "QHash<int, int> (size = 1)");
    assert_eq!(first_children, second.collect_children());
}

#[test]
fn test_hash_stops_at_reported_size()
{
    // Header claims one entry but two buckets are occupied: the walk must
    // stop at the reported count instead of trusting the slots.
    let mut f = Fixture::new();
    let mut table = HashFixture::new(&mut f, 128, 8, 8);
    for (bucket, key) in [(3u64, 1i32), (9, 2)] {
        let entry = table.occupy(&mut f, bucket);
        f.mem.poke_i32(entry, key);
        f.mem.poke_i32(entry + 4, key);
    }
    table.set_size(&mut f, 1);
    let handle = table.handle(&mut f);

    let catalogue = Catalogue::qt6();
    let rendered = catalogue.decode(&f.mem, &TypedRef::new(handle, qhash_int_int())).unwrap();
    assert_eq!(rendered.collect_children().len(), 2); // one key, one value
}

#[test]
fn test_set_yields_keys_renumbered()
{
    let mut f = Fixture::new();
    // Key-only entries: stride 4.
    let mut table = HashFixture::new(&mut f, 128, 4, 8);
    for (bucket, key) in [(10u64, 100i32), (20, 200), (126, 300)] {
        let entry = table.occupy(&mut f, bucket);
        f.mem.poke_i32(entry, key);
    }
    let handle = table.handle(&mut f);

    let catalogue = Catalogue::qt6();
    let rendered = catalogue.decode(&f.mem, &TypedRef::new(handle, qset_int())).unwrap();
    assert_eq!(rendered.display, "QSet<int> (size = 3)");
    assert_eq!(rendered.num_children, Some(3));

    let children = rendered.collect_children();
    let keys: Vec<i32> = children.iter().map(|c| f.mem.read_i32(c.value.addr).unwrap()).collect();
    assert_eq!(keys, vec![100, 200, 300]);
    let labels: Vec<&str> = children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["0", "1", "2"]);
}

#[test]
fn test_multi_hash_repeats_key_per_chained_value()
{
    let mut f = Fixture::new();
    // {i32 key, chain*} entries: chain pointer at +8, stride 16.
    let mut table = HashFixture::new(&mut f, 128, 16, 8);

    // Bucket 4: key 1 with chained values 10, 20. Chain nodes are
    // {i32 value, next*} with the next pointer at +8.
    let chain_b = f.alloc(16, 8);
    f.mem.poke_i32(chain_b, 20);
    f.mem.poke_ptr(chain_b + 8, 0);
    let chain_a = f.alloc(16, 8);
    f.mem.poke_i32(chain_a, 10);
    f.mem.poke_ptr(chain_a + 8, chain_b);
    let entry = table.occupy(&mut f, 4);
    f.mem.poke_i32(entry, 1);
    f.mem.poke_ptr(entry + 8, chain_a);

    // Bucket 90: key 2 with a single value 30.
    let chain_c = f.alloc(16, 8);
    f.mem.poke_i32(chain_c, 30);
    f.mem.poke_ptr(chain_c + 8, 0);
    let entry = table.occupy(&mut f, 90);
    f.mem.poke_i32(entry, 2);
    f.mem.poke_ptr(entry + 8, chain_c);

    let handle = table.multi_handle(&mut f, 3);

    let catalogue = Catalogue::qt6();
    let rendered = catalogue
        .decode(&f.mem, &TypedRef::new(handle, qmultihash_int_int()))
        .unwrap();
    assert_eq!(rendered.display, "QMultiHash<int, int> (size = 3)");
    assert_eq!(rendered.num_children, Some(6));

    let children = rendered.collect_children();
    let decoded: Vec<i32> = children.iter().map(|c| f.mem.read_i32(c.value.addr).unwrap()).collect();
    // The key repeats consecutively, once per chained value.
    assert_eq!(decoded, vec![1, 10, 1, 20, 2, 30]);
}

#[test]
fn test_multi_hash_chain_cycle_stops_walk()
{
    let mut f = Fixture::new();
    let mut table = HashFixture::new(&mut f, 128, 16, 8);

    // A chain node pointing back at itself.
    let chain = f.alloc(16, 8);
    f.mem.poke_i32(chain, 10);
    f.mem.poke_ptr(chain + 8, chain);
    let entry = table.occupy(&mut f, 0);
    f.mem.poke_i32(entry, 1);
    f.mem.poke_ptr(entry + 8, chain);

    let handle = table.multi_handle(&mut f, 2);

    let catalogue = Catalogue::qt6();
    let rendered = catalogue
        .decode(&f.mem, &TypedRef::new(handle, qmultihash_int_int()))
        .unwrap();
    // The walk is bounded: it must terminate without yielding more than the
    // reported number of values.
    let children = rendered.collect_children();
    assert!(children.len() <= 4);
}

#[test]
fn test_empty_multi_hash()
{
    let mut f = Fixture::new();
    let handle = f.alloc(16, 8); // null data pointer, zero size

    let catalogue = Catalogue::qt6();
    let rendered = catalogue
        .decode(&f.mem, &TypedRef::new(handle, qmultihash_int_int()))
        .unwrap();
    assert_eq!(rendered.display, "QMultiHash<int, int> (size = 0)");
    assert!(rendered.collect_children().is_empty());
}
