const COMMANDS: &[&str] = &["create_control", "invoke_method", "remove_control"];

fn main() {
  tauri_plugin::Builder::new(COMMANDS).build();
}
