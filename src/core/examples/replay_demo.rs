use env_logger::Env;
use log::info;
use miel_audit::configuration::Config;
use miel_audit::controller::controller_handler::Controller;
use std::env;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

// Replays a short recorded session through the JSON and database outputs.
fn main() {
    // Initialize logger (RUST_LOG can override; default to info)
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    let out_dir: PathBuf = env::var("REPLAY_DEMO_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            env::current_dir()
                .expect("cwd")
                .join("target")
                .join("replay_demo")
        });
    fs::create_dir_all(&out_dir).expect("create output dir");

    let ttylog = out_dir.join("20150301-120000-demo.log");
    fs::write(&ttylog, b"root@svr04:~# uname -a\r\nLinux svr04 3.2.0-4-amd64\r\n")
        .expect("write ttylog");

    let config = Config::from_toml_str(&format!(
        "[honeypot]\nsensor_name = \"replay-demo\"\n\n\
         [output.json]\nlogfile = \"{}\"\n\n\
         [output.database]\npath = \"{}\"\n",
        out_dir.join("kippo.json").display(),
        out_dir.join("kippo.sqlite3").display()
    ))
    .expect("demo config");

    let system = "HoneyPotTransport,0,192.0.2.10";
    let events = [
        r#"{"eventid":"KIPP0001","sessionno":0,"src_ip":"192.0.2.10","src_port":50911,"dst_ip":"10.0.0.1","dst_port":2222}"#.to_string(),
        format!(r#"{{"eventid":"KIPP0009","version":"SSH-2.0-OpenSSH_6.6.1","system":"{}"}}"#, system),
        format!(r#"{{"eventid":"KIPP0002","username":"root","password":"123456","system":"{}"}}"#, system),
        format!(r#"{{"eventid":"KIPP0004","logfile":"{}","system":"{}"}}"#, ttylog.display(), system),
        format!(r#"{{"eventid":"KIPP0005","input":"uname -a","system":"{}"}}"#, system),
        format!(r#"{{"eventid":"KIPP0007","url":"http://198.51.100.3/bot.sh","outfile":"dl/bot.sh","system":"{}"}}"#, system),
        format!(r#"{{"eventid":"KIPP0011","system":"{}"}}"#, system),
    ];

    let controller = Controller::new(&config).expect("controller");
    let stats = controller
        .ingest(Cursor::new(events.join("\n")), "replay")
        .expect("replay");
    controller.shutdown().expect("shutdown");

    info!(
        "Replayed {} event(s) into {}",
        stats.delivered,
        out_dir.display()
    );
}
