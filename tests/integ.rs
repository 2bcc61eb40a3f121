use anyhow::Result;
use eventual::{App, Args, Settings};
use std::path::PathBuf;
use tempfile::tempdir;

const BUCKET_URN: &str = "urn:eventual:dev::memory:index:Bucket::bucket";
const OBJECT_URN: &str = "urn:eventual:dev::memory:index:Object::object";

fn basic_args(output: Option<String>) -> Args {
    Args {
        stack: String::from("dev"),
        preview: false,
        latency: 5,
        timeout: 10,
        output,
        fail: None,
        destroy: false,
        verbose: 2,
    }
}

/// Run the app, returning its result and the report it wrote.
fn run_with(mut args: Args) -> Result<(Result<()>, String)> {
    simple_logging::log_to_stderr(log::LevelFilter::Trace);

    let dir = tempdir()?;
    let mut report = PathBuf::from(dir.path());
    report.push("report.txt");
    args.output = Some(report.to_str().unwrap().to_owned());

    let settings: Settings = args.try_into()?;
    let result = App::new(settings).run();

    let text = std::fs::read_to_string(&report)?;
    dir.close()?;
    Ok((result, text))
}

#[test]
fn test_update() -> Result<()> {
    let (result, report) = run_with(basic_args(None))?;
    result?;

    let expected = format!(
        "update of stack dev
{BUCKET_URN}
    id: bucket-0001
    name: \"photos-0001\"
    versioned: true
{OBJECT_URN}
    id: object-0001
    size: 4
    url: \"memory://photos-0001.buckets.local/cat.jpg\"
ids: bucket-0001, object-0001
"
    );
    assert_eq!(report, expected);
    Ok(())
}

#[test]
fn test_preview_reports_unknowns() -> Result<()> {
    let mut args = basic_args(None);
    args.preview = true;
    let (result, report) = run_with(args)?;
    result?;

    let expected = format!(
        "preview of stack dev
{BUCKET_URN}
    id: <unknown>
    name: <unknown>
    versioned: true
{OBJECT_URN}
    id: <unknown>
    size: 4
    url: <unknown>
ids: <unknown>
"
    );
    assert_eq!(report, expected);
    Ok(())
}

#[test]
fn test_preview_ignores_injected_failure() -> Result<()> {
    let mut args = basic_args(None);
    args.preview = true;
    args.fail = Some(String::from("bucket"));
    let (result, report) = run_with(args)?;
    result?;
    assert!(!report.contains("error"));
    Ok(())
}

#[test]
fn test_object_failure() -> Result<()> {
    let mut args = basic_args(None);
    args.fail = Some(String::from("object"));
    let (result, report) = run_with(args)?;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "1 of 2 resources failed");

    // the bucket was still created:
    assert!(report.contains("    id: bucket-0001\n"));
    let object_error = format!("{OBJECT_URN}\n    error: while creating {OBJECT_URN}: injected failure\n");
    assert!(report.contains(&object_error), "{report}");
    assert!(report.ends_with(&format!("ids: error: while creating {OBJECT_URN}: injected failure\n")));
    Ok(())
}

#[test]
fn test_bucket_failure_propagates() -> Result<()> {
    let mut args = basic_args(None);
    args.fail = Some(String::from("bucket"));
    let (result, report) = run_with(args)?;

    assert_eq!(result.unwrap_err().to_string(), "2 of 2 resources failed");
    let object_error = format!(
        "{OBJECT_URN}\n    error: while awaiting property \"bucket\": while creating {BUCKET_URN}: injected failure\n"
    );
    assert!(report.contains(&object_error), "{report}");
    Ok(())
}

#[test]
fn test_timeout() -> Result<()> {
    let mut args = basic_args(None);
    args.latency = 1500;
    args.timeout = 1;
    let (result, report) = run_with(args)?;

    assert!(result.is_err());
    assert!(report.contains("deadline exceeded"), "{report}");
    Ok(())
}

#[test]
fn test_destroy() -> Result<()> {
    let mut args = basic_args(None);
    args.destroy = true;
    let (result, _) = run_with(args)?;
    result?;
    Ok(())
}

#[test]
fn test_invalid_settings() {
    let mut args = basic_args(None);
    args.timeout = 0;
    assert!(Settings::try_from(args).is_err());

    let mut args = basic_args(None);
    args.fail = Some(String::from("database"));
    let err = Settings::try_from(args).unwrap_err();
    assert_eq!(
        err.to_string(),
        "no resource named 'database' (expected one of: bucket, object)"
    );

    let mut args = basic_args(None);
    args.stack = String::from("a::b");
    assert!(Settings::try_from(args).is_err());
}
