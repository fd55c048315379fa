use std::fs;
use std::path::Path;

use speculate2::speculate;
use vr_supervisor::autorun::EntryFormat;
use vr_supervisor::Autorun;

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let exe = Path::new("/opt/vr/vrsup");
    }

    describe "desktop entries" {
        before {
            let autorun = Autorun::with_format(dir.path().join("autostart"), EntryFormat::Desktop);
        }

        it "reports not installed before install" {
            let status = autorun.status();
            assert!(!status.installed);
            assert!(status.path.ends_with("vr-supervisor.desktop"));
        }

        it "installs an entry that runs the startup sequence" {
            let path = autorun.install(exe).expect("Failed to install");

            let body = fs::read_to_string(&path).unwrap();
            assert!(body.contains("Exec=\"/opt/vr/vrsup\" run-startup"));
            assert!(autorun.status().installed);
        }

        it "overwrites an existing entry" {
            autorun.install(Path::new("/old/vrsup")).unwrap();
            let path = autorun.install(exe).unwrap();

            let body = fs::read_to_string(&path).unwrap();
            assert!(!body.contains("/old/vrsup"));
        }

        it "uninstalls" {
            autorun.install(exe).unwrap();

            assert!(autorun.uninstall().expect("Failed to uninstall"));
            assert!(!autorun.status().installed);
        }

        it "treats uninstalling a missing entry as success" {
            assert!(!autorun.uninstall().expect("Failed to uninstall"));
        }
    }

    describe "cmd entries" {
        it "writes a batch file" {
            let autorun = Autorun::with_format(dir.path(), EntryFormat::Cmd);
            let path = autorun.install(exe).unwrap();

            assert!(path.ends_with("vr-supervisor.cmd"));
            let body = fs::read_to_string(&path).unwrap();
            assert!(body.contains("run-startup"));
        }
    }
}
