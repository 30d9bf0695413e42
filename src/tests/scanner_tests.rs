use super::support::{Array, FixedSpace};
use crate::error::ConsolidateError;
use crate::scanner::validation::{normalize_subfolder, validate_path, validate_share_name};
use crate::scanner::{is_disk_name, walk_tree, FolderSummary, Topology, WalkedEntry};
use std::path::{Path, PathBuf};

#[test]
fn test_validate_path_rejects_fuse() {
    assert!(validate_path("/mnt/user/some/file").is_err());
    assert!(validate_path("/mnt/user0/some/file").is_err());
    assert!(validate_path("/mnt/disk1/some/file").is_ok());
    assert!(validate_path("/mnt/cache/some/file").is_ok());
}

#[test]
fn test_validate_path_allows_direct_disks() {
    assert!(validate_path("/mnt/disk1/movies/test.mkv").is_ok());
    assert!(validate_path("/mnt/disk25/data/file.txt").is_ok());
    assert!(validate_path("/mnt/cache/appdata/").is_ok());
}

#[test]
fn test_disk_names() {
    for name in ["disk1", "disk9", "disk28", "cache", "cache2"] {
        assert!(is_disk_name(name), "{name}");
    }
    for name in ["disk0", "disk100", "user", "user0", "disks", "remotes", "Disk1"] {
        assert!(!is_disk_name(name), "{name}");
    }
}

#[test]
fn test_share_name_validation() {
    let reserved = vec!["@".to_string(), ".".to_string()];
    assert!(validate_share_name("Movies", &reserved).is_ok());
    for bad in ["", "a/b", "..", "@appdata", ".Recycle.Bin"] {
        assert!(
            matches!(validate_share_name(bad, &reserved), Err(ConsolidateError::InvalidInput(_))),
            "{bad}"
        );
    }
}

#[test]
fn test_normalize_subfolder() {
    assert_eq!(normalize_subfolder("/TV/Show/").unwrap(), PathBuf::from("TV/Show"));
    assert_eq!(normalize_subfolder("Inception").unwrap(), PathBuf::from("Inception"));
    assert!(normalize_subfolder("").is_err());
    assert!(normalize_subfolder("   /").is_err());
    assert!(normalize_subfolder("TV/../../etc").is_err());
    assert!(normalize_subfolder("./TV").is_err());
}

#[test]
fn test_scan_orders_disks_naturally_with_cache_last() {
    let array = Array::new(&["disk10", "cache", "disk2", "disk1", "user", "user0", "disks"]);
    let topology = array.topology(500);

    let names: Vec<&str> = topology.disks().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["disk1", "disk2", "disk10", "cache"]);
    assert!(topology.disks().iter().all(|d| d.free_bytes == 500));
    assert_eq!(topology.disk("disk2").unwrap().mount_path, array.disk("disk2"));
}

#[test]
fn test_scan_skips_excluded_disks() {
    let mut array = Array::new(&["disk1", "disk2", "disk3"]);
    array.config.excluded_disks.insert("disk3".to_string());
    let topology = Topology::scan(&array.config, &FixedSpace(0)).unwrap();
    assert!(topology.disk("disk3").is_none());
    assert_eq!(topology.disks().len(), 2);
}

#[test]
fn test_scan_missing_mount_base() {
    let mut array = Array::new(&[]);
    array.config.mnt_base = array.dir.path().join("missing").to_string_lossy().to_string();
    assert!(matches!(
        Topology::scan(&array.config, &FixedSpace(0)),
        Err(ConsolidateError::InvalidTarget(_))
    ));
}

#[test]
fn test_list_shares_excludes_reserved() {
    let array = Array::new(&["disk1", "disk2"]);
    array.mkdir("disk1", "Movies");
    array.mkdir("disk2", "TV");
    array.mkdir("disk2", "Movies");
    array.mkdir("disk1", "@appdata");
    array.mkdir("disk2", ".Recycle.Bin");
    array.write("disk1", "stray.txt", 3);

    let shares = array.topology(0).list_shares().unwrap();
    assert_eq!(shares, vec!["Movies", "TV"]);
}

#[test]
fn test_list_shares_prefers_union_mount() {
    let array = Array::new(&["disk1", "user"]);
    array.mkdir("disk1", "Movies");
    array.mkdir("user", "Movies");
    array.mkdir("user", "Photos");
    array.mkdir("user", "@system");

    let shares = array.topology(0).list_shares().unwrap();
    assert_eq!(shares, vec!["Movies", "Photos"]);
}

#[test]
fn test_share_roots_report_absent_disks() {
    let array = Array::new(&["disk1", "disk2", "disk3"]);
    array.mkdir("disk1", "Movies");
    array.mkdir("disk3", "Movies");

    let topology = array.topology(0);
    let roots = topology.list_share_roots("Movies");
    assert_eq!(roots["disk1"], Some(array.disk("disk1").join("Movies")));
    assert_eq!(roots["disk2"], None);
    assert!(roots["disk3"].is_some());
    assert!(topology.has_share("Movies"));
    assert!(!topology.has_share("Music"));
}

#[test]
fn test_list_folders_marks_split_folders() {
    let array = Array::new(&["disk1", "disk2"]);
    array.write("disk1", "Movies/Inception/a.mkv", 100);
    array.write("disk2", "Movies/Inception/b.mkv", 50);
    array.write("disk2", "Movies/Heat/heat.mkv", 10);

    let folders = array.topology(0).list_folders("Movies").unwrap();
    assert_eq!(folders.len(), 2);

    let heat = &folders[0];
    assert_eq!(heat.name, "Heat");
    assert!(!heat.is_split());

    let inception = &folders[1];
    assert_eq!(inception.name, "Inception");
    assert!(inception.is_split());
    assert_eq!(inception.disks["disk1"], 100);
    assert_eq!(inception.disks["disk2"], 50);
}

#[test]
fn test_fullest_disk_picks_largest_array_disk() {
    let folder = |disks: &[(&str, u64)]| FolderSummary {
        name: "Inception".to_string(),
        disks: disks.iter().map(|(d, b)| ((*d).to_string(), *b)).collect(),
    };

    assert_eq!(folder(&[("disk1", 10), ("disk2", 50), ("disk3", 20)]).fullest_disk(), Some("disk2"));
    // Natural order breaks ties: disk2 sorts before disk10.
    assert_eq!(folder(&[("disk10", 30), ("disk2", 30)]).fullest_disk(), Some("disk2"));
    assert_eq!(folder(&[("cache", 900), ("disk4", 1)]).fullest_disk(), Some("disk4"));
    assert_eq!(folder(&[("cache", 900)]).fullest_disk(), None);
}

#[test]
fn test_walk_tree_reports_relative_entries() {
    let array = Array::new(&["disk1"]);
    let root = array.mkdir("disk1", "Movies/Inception");
    array.write("disk1", "Movies/Inception/extras/making-of.mkv", 7);
    array.write("disk1", "Movies/Inception/movie.mkv", 11);
    #[cfg(unix)]
    std::os::unix::fs::symlink(root.join("movie.mkv"), root.join("link.mkv")).unwrap();

    let entries = walk_tree(&root, 1);
    assert!(entries.contains(&WalkedEntry::Directory { relative_path: PathBuf::from("extras") }));
    assert!(entries.iter().any(|e| matches!(
        e,
        WalkedEntry::File { relative_path, size_bytes: 11, .. } if relative_path == Path::new("movie.mkv")
    )));
    assert!(entries.iter().any(|e| matches!(
        e,
        WalkedEntry::File { relative_path, size_bytes: 7, .. }
            if relative_path == Path::new("extras/making-of.mkv")
    )));
    #[cfg(unix)]
    assert!(entries.contains(&WalkedEntry::Other { relative_path: PathBuf::from("link.mkv") }));
}
