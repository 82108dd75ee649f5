use lockstep_core::version::version_string;
use lockstep_core::VERSION;
use miette::Result;

pub fn run(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "name": "lockstep",
                "version": VERSION,
            })
        );
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
