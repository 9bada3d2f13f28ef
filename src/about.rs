pub const MSIWEB_DISPLAY_VERSION: &str = env!("MSIWEB_DISPLAY_VERSION");
pub const MSIWEB_BUILD_N: &str = env!("MSIWEB_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "MSIweb {}\nBuild {}\nRun orchestration core for the MSIanalyzer web control panel",
        MSIWEB_DISPLAY_VERSION, MSIWEB_BUILD_N
    )
}
