use std::fmt;

use output::{Context, Id, Output, Resolved, TypedOutput, Urn, Value};
use resource::{await_properties, Inputs, Mode, PropertyMap, PropertyValue, Resource};

const UNKNOWN: &str = "<unknown>";

/// Final state of one resource.
#[derive(Debug)]
pub struct ResourceReport {
    pub urn: Urn,
    pub id: Result<Resolved<Id>, output::Error>,
    pub properties: anyhow::Result<PropertyMap>,
}

impl ResourceReport {
    /// Wait for every output of `resource`.
    pub fn collect(ctx: &Context, resource: &Resource) -> Self {
        let mut outputs = Inputs::new();
        for (name, output) in resource.outputs() {
            outputs.insert(name, output.boxed_clone());
        }
        Self {
            urn: resource.urn().clone(),
            id: resource.id().await_value(ctx),
            properties: await_properties(ctx, &outputs).map_err(anyhow::Error::from),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.id.is_ok() && self.properties.is_ok()
    }
}

/// Final state of a deployment, as printed at the end of a run.
#[derive(Debug)]
pub struct Report {
    pub stack: String,
    pub mode: Mode,
    pub resources: Vec<ResourceReport>,
    /// ids of every resource, joined into one output
    pub ids: Result<Resolved<Vec<String>>, output::Error>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.resources.iter().filter(|r| !r.is_ok()).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Preview => "preview",
            Mode::Update => "update",
        };
        writeln!(f, "{mode} of stack {}", self.stack)?;

        for resource in &self.resources {
            writeln!(f, "{}", resource.urn)?;
            match &resource.id {
                Ok(Resolved::Known(id)) => writeln!(f, "    id: {id}")?,
                Ok(Resolved::Unknown) => writeln!(f, "    id: {UNKNOWN}")?,
                Err(e) => {
                    writeln!(f, "    error: {e}")?;
                    continue;
                }
            }
            match &resource.properties {
                Ok(props) => {
                    for (name, value) in props {
                        writeln!(f, "    {name}: {}", render_property(value))?;
                    }
                }
                Err(e) => writeln!(f, "    error: {e:#}")?,
            }
        }

        match &self.ids {
            Ok(Resolved::Known(ids)) => writeln!(f, "ids: {}", ids.join(", ")),
            Ok(Resolved::Unknown) => writeln!(f, "ids: {UNKNOWN}"),
            Err(e) => writeln!(f, "ids: error: {e}"),
        }
    }
}

pub fn render_property(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Known(value) => render_value(value),
        PropertyValue::Unknown => String::from(UNKNOWN),
    }
}

/// Render the builtin element types; anything else is opaque.
pub fn render_value(value: &Value) -> String {
    macro_rules! display {
        ($($t:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$t>() {
                    return v.to_string();
                }
            )*
        };
    }

    if let Some(s) = value.downcast_ref::<String>() {
        return format!("{s:?}");
    }
    display!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, Id, Urn);
    if let Some(values) = value.downcast_ref::<Vec<Value>>() {
        let strs: Vec<String> = values.iter().map(render_value).collect();
        return format!("[{}]", strs.join(", "));
    }
    if let Some(strs) = value.downcast_ref::<Vec<String>>() {
        return format!("{strs:?}");
    }
    String::from("<opaque>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    fn val<T: Any + Send + Sync>(t: T) -> Value {
        Arc::new(t)
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&val(String::from("a"))), "\"a\"");
        assert_eq!(render_value(&val(3u64)), "3");
        assert_eq!(render_value(&val(Id::from("x-1"))), "x-1");
        assert_eq!(render_value(&val(vec![val(true), val(1i32)])), "[true, 1]");
        assert_eq!(render_value(&val(())), "<opaque>");
        assert_eq!(render_property(&PropertyValue::Unknown), "<unknown>");
    }

    #[test]
    fn test_display() {
        let mut props = PropertyMap::new();
        props.insert(String::from("name"), PropertyValue::Unknown);
        props.insert(String::from("size"), PropertyValue::known(2u64));
        let report = Report {
            stack: String::from("dev"),
            mode: Mode::Preview,
            resources: vec![
                ResourceReport {
                    urn: Urn::from("urn:a"),
                    id: Ok(Resolved::Unknown),
                    properties: Ok(props),
                },
                ResourceReport {
                    urn: Urn::from("urn:b"),
                    id: Err(output::Error::Canceled),
                    properties: Ok(PropertyMap::new()),
                },
            ],
            ids: Ok(Resolved::Unknown),
        };
        let expected = "preview of stack dev
urn:a
    id: <unknown>
    name: <unknown>
    size: 2
urn:b
    error: operation was canceled
ids: <unknown>
";
        assert_eq!(report.to_string(), expected);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_display_property_error_chain() {
        let err = resource::Error::Property {
            name: String::from("size"),
            source: output::Error::DeadlineExceeded,
        };
        let report = Report {
            stack: String::from("dev"),
            mode: Mode::Update,
            resources: vec![ResourceReport {
                urn: Urn::from("urn:a"),
                id: Ok(Resolved::Known(Id::from("a-1"))),
                properties: Err(anyhow::Error::from(err)),
            }],
            ids: Ok(Resolved::Known(vec![String::from("a-1")])),
        };
        let expected = "update of stack dev
urn:a
    id: a-1
    error: while awaiting property \"size\": context deadline exceeded
ids: a-1
";
        assert_eq!(report.to_string(), expected);
        assert_eq!(report.failed(), 1);
    }
}
