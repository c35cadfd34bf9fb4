//! The `trestle impls` command: list registered backend implementations.

use console::style;

use trestle_core::service::impl_names;

pub fn run(json: bool) {
    trestle_infra::register_builtin_impls();
    let names = impl_names();

    if json {
        println!("{}", serde_json::json!(names));
        return;
    }

    println!();
    println!("  {}", style("Service backend impls").bold());
    for name in &names {
        println!("    {}", name);
    }
    println!();
}
