use kernel_info::mmap::MmapRecord;
use kernel_memory_addresses::{PhysicalPage, VirtualPage};
use kernel_mmap::{BootMemoryMap, RegionTable};
use proptest::prelude::*;

fn encode(records: &[(u64, u64, u32)]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|&(base_addr, length, ty)| {
            MmapRecord {
                size: 20,
                base_addr,
                length,
                ty,
            }
            .to_bytes()
        })
        .collect()
}

fn record() -> impl Strategy<Value = (u64, u64, u32)> {
    (0u64..0x1_0000_0000, 0u64..0x1000_0000, prop_oneof![Just(1u32), 2u32..5])
}

proptest! {
    #[test]
    fn table_is_sorted_and_disjoint(records in prop::collection::vec(record(), 0..400)) {
        let bytes = encode(&records);
        let Ok(table) = RegionTable::from_boot_map(&BootMemoryMap::from_bytes(&bytes)) else {
            return Ok(());
        };

        prop_assert!(table.len() <= 255);
        for r in table.iter() {
            prop_assert!(r.length > 0);
        }
        for pair in table.as_slice().windows(2) {
            prop_assert!(pair[0].end() <= pair[1].start);
        }
    }

    #[test]
    fn linear_translation_round_trips(records in prop::collection::vec(record(), 1..40), pick in any::<u64>()) {
        let bytes = encode(&records);
        let Ok(table) = RegionTable::from_boot_map(&BootMemoryMap::from_bytes(&bytes)) else {
            return Ok(());
        };

        let span = table.total_pages();
        let v = VirtualPage::new(pick % span);
        let p = table.calculate_physical(v).expect("inside the span");
        prop_assert_eq!(table.calculate_virtual(p), Some(v));

        let region = &table.as_slice()[(pick as usize) % table.len()];
        let frame: PhysicalPage = region.start + (pick % region.length);
        let alias = table.calculate_virtual(frame).expect("frame is covered");
        prop_assert_eq!(table.calculate_physical(alias), Some(frame));
    }
}
