//! Environment store persistence tests
//!
//! Drives the full load/mutate/save/reload cycle against the mock flash,
//! including the wear-leveling migration and recovery paths.

use flash_env::env::{EnvDefault, EnvError, EnvStore, RegionLayout};
use flash_env::platform::mock::MockFlash;
use flash_env::platform::FlashInterface;

const REGION_BASE: u32 = 0x1000;
const REGION_SIZE: u32 = 0x1000;
const ERASE_UNIT: u32 = 0x200;

const DEFAULTS: &[EnvDefault] = &[
    EnvDefault::new("boot_times", "0"),
    EnvDefault::new("user", "admin"),
];

fn layout(crc_check: bool) -> RegionLayout {
    RegionLayout::new(REGION_BASE, REGION_SIZE, ERASE_UNIT, crc_check)
}

fn boot(crc_check: bool) -> EnvStore<MockFlash> {
    let flash = MockFlash::new(0x10000, ERASE_UNIT);
    EnvStore::init(flash, layout(crc_check), DEFAULTS).unwrap()
}

fn reboot(store: EnvStore<MockFlash>, crc_check: bool) -> EnvStore<MockFlash> {
    EnvStore::init(store.into_flash(), layout(crc_check), DEFAULTS).unwrap()
}

fn read_slot(store: &mut EnvStore<MockFlash>) -> u32 {
    let bytes = store.flash_mut().get_contents(REGION_BASE, 4);
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[test]
fn first_boot_installs_defaults() {
    let mut store = boot(false);

    assert_eq!(read_slot(&mut store), 0x1200);
    assert_eq!(store.get("boot_times"), Some("0"));
    assert_eq!(store.get("user"), Some("admin"));
    assert_eq!(store.used_size(), 32);
    assert_eq!(store.total_size(), REGION_SIZE);
}

#[test]
fn set_new_key_grows_by_record_length() {
    let mut store = boot(false);
    let before = store.used_size();

    // 2 + 12 + 2 bytes, already word aligned
    store.set("ip", "192.168.1.10").unwrap();
    assert_eq!(store.get("ip"), Some("192.168.1.10"));
    assert_eq!(store.used_size(), before + 16);

    // 4 + 13 + 2 bytes rounds up to 20
    store.set("mask", "255.255.255.0").unwrap();
    assert_eq!(store.used_size(), before + 16 + 20);
}

#[test]
fn overwrite_replaces_single_record() {
    let mut store = boot(false);
    store.set("ip", "192.168.1.10").unwrap();

    store.set("user", "root").unwrap();
    assert_eq!(store.get("user"), Some("root"));

    // Same padded length, so usage is unchanged by the overwrite
    let after_overwrite = store.used_size();
    store.set("user", "admin").unwrap();
    assert_eq!(store.used_size(), after_overwrite);
}

#[test]
fn delete_restores_previous_usage() {
    let mut store = boot(false);
    let post_boot = store.used_size();

    store.set("ip", "192.168.1.10").unwrap();
    store.set("user", "root").unwrap(); // same length as "admin"
    store.del("ip").unwrap();

    assert_eq!(store.get("ip"), None);
    assert_eq!(store.used_size(), post_boot);

    assert_eq!(store.del("ip"), Err(EnvError::NameError));
}

#[test]
fn deletion_compactness() {
    let mut store = boot(false);

    store.set("alpha", "12345").unwrap();
    store.set("omega", "xyz").unwrap();
    let with_both = store.used_size();

    // del + re-create of an equal-length value lands on the same usage
    store.del("alpha").unwrap();
    store.set("alpha", "54321").unwrap();
    assert_eq!(store.used_size(), with_both);
    assert_eq!(store.get("alpha"), Some("54321"));
    assert_eq!(store.get("omega"), Some("xyz"));
}

#[test]
fn usage_stays_word_aligned() {
    let mut store = boot(false);
    assert_eq!(store.used_size() % 4, 0);

    for (key, value) in [("a", "1"), ("bb", "22"), ("ccc", "333"), ("dddd", "4444")] {
        store.set(key, value).unwrap();
        assert_eq!(store.used_size() % 4, 0);
    }

    store.del("bb").unwrap();
    assert_eq!(store.used_size() % 4, 0);
}

#[test]
fn round_trip_after_reboot() {
    let mut store = boot(false);

    store.set("ip", "192.168.1.10").unwrap();
    store.set("user", "root").unwrap();
    store.set("greeting", "hello world").unwrap();
    store.del("boot_times").unwrap();
    store.save().unwrap();

    let store = reboot(store, false);
    assert_eq!(store.get("ip"), Some("192.168.1.10"));
    assert_eq!(store.get("user"), Some("root"));
    assert_eq!(store.get("greeting"), Some("hello world"));
    assert_eq!(store.get("boot_times"), None);
}

#[test]
fn unsaved_changes_do_not_reach_flash() {
    let mut store = boot(false);

    store.set("ip", "10.0.0.1").unwrap();
    // No save: the mutation only lives in RAM
    let store = reboot(store, false);
    assert_eq!(store.get("ip"), None);
}

#[test]
fn boot_counter_survives_reboots() {
    let mut store = boot(false);

    for expected in 0..3u32 {
        let count: u32 = store.get("boot_times").unwrap().parse().unwrap();
        assert_eq!(count, expected);
        store
            .set("boot_times", &(count + 1).to_string())
            .unwrap();
        store.save().unwrap();
        store = reboot(store, false);
    }

    assert_eq!(store.get("boot_times"), Some("3"));
}

#[test]
fn migration_on_erase_failure() {
    let mut store = boot(false);
    store.set("ip", "192.168.1.10").unwrap();

    store.flash_mut().fail_next_erases(1);
    store.save().unwrap();

    assert_eq!(store.active_addr(), 0x1400);
    assert_eq!(read_slot(&mut store), 0x1400);

    let store = reboot(store, false);
    assert_eq!(store.active_addr(), 0x1400);
    assert_eq!(store.get("ip"), Some("192.168.1.10"));
    assert_eq!(store.get("user"), Some("admin"));
}

#[test]
fn migration_step_covers_payload() {
    let mut store = boot(false);

    // A detail area larger than one erase unit forces a two-unit step
    let blob = "x".repeat(600);
    store.set("blob", &blob).unwrap();
    let origin = store.active_addr();

    store.flash_mut().fail_next_erases(2);
    store.save().unwrap();

    let step = 2 * ERASE_UNIT; // (636 / 512 + 1) erase units
    assert_eq!(store.active_addr(), origin + 2 * step);
    assert_eq!(store.stats().migrations, 2);

    let store = reboot(store, false);
    assert_eq!(store.get("blob").map(str::len), Some(600));
}

#[test]
fn region_exhaustion_reports_full() {
    let mut store = boot(false);

    // Seven candidate blocks for a 28-byte detail area, all failing
    store.flash_mut().fail_next_erases(7);
    assert_eq!(store.save(), Err(EnvError::Full));
    assert_eq!(read_slot(&mut store), 0xFFFF_FFFF);

    // Next boot starts over from defaults at the first block
    let mut store = reboot(store, false);
    assert_eq!(store.active_addr(), 0x1200);
    assert_eq!(read_slot(&mut store), 0x1200);
    assert_eq!(store.get("user"), Some("admin"));
}

#[test]
fn fill_until_full() {
    let mut store = boot(false);
    let value = "v".repeat(61);
    // "name_NNN" + '=' + value + '\0' rounded up
    let record_len = (8 + 61 + 2u32).div_ceil(4) * 4;

    let mut result = Ok(());
    for i in 0..100 {
        result = store.set(&format!("name_{:03}", i), &value);
        if result.is_err() {
            break;
        }
    }

    assert_eq!(result, Err(EnvError::Full));
    assert!(store.used_size() + record_len >= store.total_size());

    // After trimming back below one block's worth, the store saves again
    for i in 0..10 {
        store.del(&format!("name_{:03}", i)).unwrap();
    }
    store.save().unwrap();
    let store = reboot(store, false);
    assert_eq!(store.get("name_000"), None);
    assert_eq!(store.get("name_010").map(str::len), Some(61));
}

#[test]
fn crc_detects_any_corrupted_byte() {
    // Header word, CRC word, and every record byte: flipping one bit in
    // any of them must bring the next boot back to defaults.
    let image_len = 8 + 28;
    for offset in 0..image_len {
        let mut store = boot(true);
        store.set("user", "root").unwrap();
        store.save().unwrap();

        let mut flash = store.into_flash();
        flash.inject_corruption(0x1200 + offset, 1);

        let store = EnvStore::init(flash, layout(true), DEFAULTS).unwrap();
        assert_eq!(
            store.get("user"),
            Some("admin"),
            "corruption at offset {} went undetected",
            offset
        );
    }
}

#[test]
fn crc_survives_clean_reboot() {
    let mut store = boot(true);
    store.set("user", "root").unwrap();
    store.save().unwrap();

    let store = reboot(store, true);
    assert_eq!(store.get("user"), Some("root"));
}

#[test]
fn stale_system_slot_recovers_previous_image() {
    // Erase of the old block fails (migrating the write to the next
    // block), then the system-slot update fails as well: flash now holds
    // both images, with the slot still naming the old one.
    let mut store = boot(false);
    store.set("ip", "192.168.1.10").unwrap();

    store.flash_mut().script_erase_faults(&[true, false, true]);
    store.save().unwrap();
    assert_eq!(store.active_addr(), 0x1400);
    assert_eq!(read_slot(&mut store), 0x1200);

    // The next boot observes the previous committed image
    let store = reboot(store, false);
    assert_eq!(store.active_addr(), 0x1200);
    assert_eq!(store.get("ip"), None);
    assert_eq!(store.get("user"), Some("admin"));
}

#[test]
fn torn_system_slot_write_reinitializes() {
    let mut store = boot(false);
    store.set("ip", "192.168.1.10").unwrap();
    store.flash_mut().fail_next_erases(1);
    store.save().unwrap();
    assert_eq!(read_slot(&mut store), 0x1400);

    // Power cut half way through a slot rewrite: the low half of the word
    // lands, the high half still reads erased
    let flash = store.flash_mut();
    flash.erase(REGION_BASE, 4).unwrap();
    flash.simulate_power_loss();
    flash.write(REGION_BASE, &0x1400u32.to_le_bytes()).unwrap();
    assert_eq!(read_slot(&mut store), 0xFFFF_1400);

    // The torn value cannot name a data block, so the next boot falls
    // back to defaults rather than chasing a bogus address
    let store = reboot(store, false);
    assert_eq!(store.active_addr(), 0x1200);
    assert_eq!(store.get("user"), Some("admin"));
    assert_eq!(store.get("ip"), None);
}

#[test]
fn wear_spreads_across_blocks() {
    let mut store = boot(false);

    store.flash_mut().fail_next_erases(1);
    store.set("a", "1").unwrap();
    store.save().unwrap();

    // The abandoned block is never erased again afterwards
    let before = store.flash_mut().get_erase_count(0x1200);
    store.set("b", "2").unwrap();
    store.save().unwrap();
    store.save().unwrap();

    assert_eq!(store.flash_mut().get_erase_count(0x1200), before);
    assert!(store.flash_mut().get_erase_count(0x1400) >= 2);
}
