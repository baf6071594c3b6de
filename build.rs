const COMMANDS: &[&str] = &[
   "datasource_names",
   "connect",
   "close",
   "close_all",
   "storage",
];

fn main() {
   tauri_plugin::Builder::new(COMMANDS).build();
}
