use std::collections::BTreeMap;
use std::sync::Arc;

use output::{Dependencies, Element, IdOutput, Output, TypedOutput, Urn};

use crate::Error;

/// Handle to a registered resource and its (possibly pending) outputs.
#[derive(Debug, Clone)]
pub struct Resource {
    urn: Urn,
    id: IdOutput,
    outputs: Arc<BTreeMap<String, Box<dyn Output>>>,
    input_deps: Dependencies,
}

impl Resource {
    pub(crate) fn new(
        urn: Urn,
        id: IdOutput,
        outputs: BTreeMap<String, Box<dyn Output>>,
        input_deps: Dependencies,
    ) -> Self {
        Self {
            urn,
            id,
            outputs: Arc::new(outputs),
            input_deps,
        }
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// The provider-assigned id. Unknown during preview.
    pub fn id(&self) -> &IdOutput {
        &self.id
    }

    /// Output `name` as variant `O`. Any output can be viewed as an [`output::AnyOutput`].
    pub fn output<O: TypedOutput>(&self, name: &str) -> Result<O, Error> {
        let output = self.output_dyn(name)?;
        let expected = <O::Element as Element>::element_type();
        let found = output.state().element_type();
        if !expected.is_any() && found != expected {
            return Err(Error::OutputType {
                urn: self.urn.clone(),
                name: name.to_owned(),
                found,
                expected,
            });
        }
        Ok(O::from_state(output.state().clone()))
    }

    /// Output `name` as whichever variant the registry chose for it.
    pub fn output_dyn(&self, name: &str) -> Result<&dyn Output, Error> {
        self.outputs
            .get(name)
            .map(|o| o.as_ref())
            .ok_or_else(|| Error::NoSuchOutput {
                urn: self.urn.clone(),
                name: name.to_owned(),
            })
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &dyn Output)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Resources this one's inputs were derived from.
    pub fn input_dependencies(&self) -> &Dependencies {
        &self.input_deps
    }
}
