//! Operation and resource registry.
//!
//! Descriptors are listed explicitly at startup through [`RegistryBuilder`].
//! After [`RegistryBuilder::build`] the registry is read-only and every call
//! goes through [`Registry::invoke`] or [`Registry::resolve`], which never
//! propagate a handler fault: failures come back as
//! [`InvocationResult::Failure`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use confluence_core::endpoint::encode_segment;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::context::CallContext;
use crate::error::{FailureKind, HandlerError, RegistryError};
use crate::gateway::Gateway;
use crate::template::UriTemplate;

pub const DEFAULT_MIME_TYPE: &str = "text/plain";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const HTML_MIME_TYPE: &str = "text/html";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int,
    Bool,
}

impl ParamType {
    fn schema_type(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Int => "integer",
            ParamType::Bool => "boolean",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            ParamType::String => "a string",
            ParamType::Int => "an integer",
            ParamType::Bool => "a boolean",
        }
    }
}

/// A bound argument value after coercion.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Null,
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ArgValue {
    fn fits(&self, ty: ParamType) -> bool {
        matches!(
            (self, ty),
            (ArgValue::Null, _)
                | (ArgValue::Str(_), ParamType::String)
                | (ArgValue::Int(_), ParamType::Int)
                | (ArgValue::Bool(_), ParamType::Bool)
        )
    }

    fn to_json(&self) -> Value {
        match self {
            ArgValue::Null => Value::Null,
            ArgValue::Str(value) => Value::String(value.clone()),
            ArgValue::Int(value) => json!(value),
            ArgValue::Bool(value) => Value::Bool(*value),
        }
    }
}

/// Declared parameter of an operation. Required parameters carry no default;
/// optional ones always carry one, possibly [`ArgValue::Null`].
#[derive(Clone, Debug)]
pub struct ParamSpec {
    name: &'static str,
    description: &'static str,
    ty: ParamType,
    default: Option<ArgValue>,
}

impl ParamSpec {
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            description,
            ty,
            default: None,
        }
    }

    pub fn optional(
        name: &'static str,
        ty: ParamType,
        description: &'static str,
        default: ArgValue,
    ) -> Self {
        Self {
            name,
            description,
            ty,
            default: Some(default),
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::required(name, ParamType::String, description)
    }

    pub fn opt_string(name: &'static str, description: &'static str) -> Self {
        Self::optional(name, ParamType::String, description, ArgValue::Null)
    }

    pub fn string_or(name: &'static str, description: &'static str, default: &str) -> Self {
        Self::optional(
            name,
            ParamType::String,
            description,
            ArgValue::Str(default.to_string()),
        )
    }

    pub fn int(name: &'static str, description: &'static str) -> Self {
        Self::required(name, ParamType::Int, description)
    }

    pub fn int_or(name: &'static str, description: &'static str, default: i64) -> Self {
        Self::optional(name, ParamType::Int, description, ArgValue::Int(default))
    }

    pub fn bool_or(name: &'static str, description: &'static str, default: bool) -> Self {
        Self::optional(name, ParamType::Bool, description, ArgValue::Bool(default))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    fn schema(&self) -> Value {
        let mut property = json!({
            "type": self.ty.schema_type(),
            "description": self.description,
        });
        if let Some(default) = self.default.as_ref().filter(|d| **d != ArgValue::Null) {
            property["default"] = default.to_json();
        }
        property
    }

    fn coerce(&self, raw: &Value) -> Result<ArgValue, Failure> {
        let coerced = match (self.ty, raw) {
            (ParamType::String, Value::String(value)) => Some(ArgValue::Str(value.clone())),
            (ParamType::String, Value::Number(value)) => Some(ArgValue::Str(value.to_string())),
            (ParamType::String, Value::Bool(value)) => Some(ArgValue::Str(value.to_string())),
            (ParamType::Int, Value::Number(value)) => value.as_i64().map(ArgValue::Int),
            (ParamType::Int, Value::String(value)) => {
                value.trim().parse::<i64>().ok().map(ArgValue::Int)
            }
            (ParamType::Bool, Value::Bool(value)) => Some(ArgValue::Bool(*value)),
            (ParamType::Bool, Value::String(value)) => {
                let value = value.trim();
                if value.eq_ignore_ascii_case("true") {
                    Some(ArgValue::Bool(true))
                } else if value.eq_ignore_ascii_case("false") {
                    Some(ArgValue::Bool(false))
                } else {
                    None
                }
            }
            _ => None,
        };
        coerced.ok_or_else(|| {
            Failure::new(
                FailureKind::BadArgument,
                format!("argument '{}' must be {}", self.name, self.ty.expected()),
            )
        })
    }
}

/// Arguments after binding, in declaration order (or template order for
/// resources).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundArgs {
    values: Vec<(String, ArgValue)>,
}

impl BoundArgs {
    pub fn new(values: Vec<(String, ArgValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn str(&self, name: &str) -> Result<&str, HandlerError> {
        match self.get(name) {
            Some(ArgValue::Str(value)) => Ok(value),
            _ => Err(HandlerError::invalid(format!("argument '{name}' is not bound"))),
        }
    }

    /// String argument escaped for interpolation as a single URL path segment.
    pub fn segment(&self, name: &str) -> Result<String, HandlerError> {
        self.str(name).map(encode_segment)
    }

    /// `None` for null, unset or blank strings.
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::Str(value)) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, HandlerError> {
        match self.get(name) {
            Some(ArgValue::Int(value)) => Ok(*value),
            _ => Err(HandlerError::invalid(format!("argument '{name}' is not bound"))),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, HandlerError> {
        match self.get(name) {
            Some(ArgValue::Bool(value)) => Ok(*value),
            _ => Err(HandlerError::invalid(format!("argument '{name}' is not bound"))),
        }
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<String, HandlerError>> + Send>>;
pub type Handler = Arc<dyn Fn(CallContext, BoundArgs) -> HandlerFuture + Send + Sync>;

/// Wrap an async fn or closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(CallContext, BoundArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, HandlerError>> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

pub struct OperationDescriptor {
    id: &'static str,
    description: &'static str,
    params: Vec<ParamSpec>,
    mime_type: &'static str,
    failure_prefix: Option<&'static str>,
    handler: Handler,
}

impl OperationDescriptor {
    pub fn new(id: &'static str, description: &'static str, handler: Handler) -> Self {
        Self {
            id,
            description,
            params: Vec::new(),
            mime_type: DEFAULT_MIME_TYPE,
            failure_prefix: None,
            handler,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn mime_type(mut self, mime_type: &'static str) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// Prepended to handler failures, e.g. `"Error getting page: ..."`.
    pub fn failure_prefix(mut self, prefix: &'static str) -> Self {
        self.failure_prefix = Some(prefix);
        self
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.params {
            properties.insert(spec.name.to_string(), spec.schema());
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|spec| spec.is_required())
            .map(|spec| spec.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for spec in &self.params {
            if !seen.insert(spec.name) {
                return Err(RegistryError::InvalidParameter {
                    operation: self.id.to_string(),
                    reason: format!("parameter '{}' declared twice", spec.name),
                });
            }
            if let Some(default) = &spec.default
                && !default.fits(spec.ty)
            {
                return Err(RegistryError::InvalidParameter {
                    operation: self.id.to_string(),
                    reason: format!(
                        "default of '{}' is not {}",
                        spec.name,
                        spec.ty.expected()
                    ),
                });
            }
        }
        Ok(())
    }

    fn bind(&self, args: &Map<String, Value>) -> Result<BoundArgs, Failure> {
        let mut values = Vec::with_capacity(self.params.len());
        for spec in &self.params {
            let value = match args.get(spec.name) {
                Some(raw) if !raw.is_null() => spec.coerce(raw)?,
                _ => match &spec.default {
                    Some(default) => default.clone(),
                    None => {
                        return Err(Failure::new(
                            FailureKind::MissingArgument,
                            format!("missing required argument '{}'", spec.name),
                        ));
                    }
                },
            };
            values.push((spec.name.to_string(), value));
        }
        Ok(BoundArgs::new(values))
    }
}

pub struct ResourceDescriptor {
    uri: &'static str,
    templated: bool,
    params: &'static [&'static str],
    name: &'static str,
    description: &'static str,
    mime_type: &'static str,
    handler: Handler,
}

impl ResourceDescriptor {
    pub fn fixed(uri: &'static str, name: &'static str, description: &'static str, handler: Handler) -> Self {
        Self {
            uri,
            templated: false,
            params: &[],
            name,
            description,
            mime_type: JSON_MIME_TYPE,
            handler,
        }
    }

    /// `params` names the arguments the handler reads; it must list exactly
    /// the placeholders of `template`.
    pub fn templated(
        template: &'static str,
        params: &'static [&'static str],
        name: &'static str,
        description: &'static str,
        handler: Handler,
    ) -> Self {
        Self {
            templated: true,
            params,
            ..Self::fixed(template, name, description, handler)
        }
    }

    pub fn mime_type(mut self, mime_type: &'static str) -> Self {
        self.mime_type = mime_type;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationResult {
    Success { payload: String, mime_type: String },
    Failure(Failure),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    /// Payload on success, failure message otherwise.
    pub fn text(&self) -> &str {
        match self {
            InvocationResult::Success { payload, .. } => payload,
            InvocationResult::Failure(failure) => &failure.message,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperationSummary {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSummary {
    pub uri: &'static str,
    pub templated: bool,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Default)]
pub struct RegistryBuilder {
    operations: Vec<OperationDescriptor>,
    resources: Vec<ResourceDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, descriptor: OperationDescriptor) -> Self {
        self.operations.push(descriptor);
        self
    }

    pub fn operations(mut self, descriptors: impl IntoIterator<Item = OperationDescriptor>) -> Self {
        self.operations.extend(descriptors);
        self
    }

    pub fn resource(mut self, descriptor: ResourceDescriptor) -> Self {
        self.resources.push(descriptor);
        self
    }

    pub fn resources(mut self, descriptors: impl IntoIterator<Item = ResourceDescriptor>) -> Self {
        self.resources.extend(descriptors);
        self
    }

    pub fn build(self, gateway: Arc<Gateway>) -> Result<Registry, RegistryError> {
        let mut operations = Vec::with_capacity(self.operations.len());
        let mut by_id = HashMap::new();
        for descriptor in self.operations {
            descriptor.validate()?;
            if by_id.contains_key(descriptor.id) {
                return Err(RegistryError::DuplicateOperation(descriptor.id.to_string()));
            }
            by_id.insert(descriptor.id, operations.len());
            operations.push(Arc::new(descriptor));
        }

        let mut resources = Vec::with_capacity(self.resources.len());
        let mut fixed = HashMap::new();
        let mut templates = Vec::new();
        let mut seen_templates = HashSet::new();
        for descriptor in self.resources {
            let index = resources.len();
            if descriptor.templated {
                if !seen_templates.insert(descriptor.uri) {
                    return Err(RegistryError::DuplicateResource(descriptor.uri.to_string()));
                }
                let template = UriTemplate::parse(descriptor.uri)?;
                template.check_parameters(descriptor.params)?;
                templates.push((template, index));
            } else if fixed.insert(descriptor.uri, index).is_some() {
                return Err(RegistryError::DuplicateResource(descriptor.uri.to_string()));
            }
            resources.push(Arc::new(descriptor));
        }

        tracing::debug!(
            event = "registry_built",
            operations = operations.len(),
            resources = resources.len(),
        );

        Ok(Registry {
            gateway,
            operations,
            by_id,
            resources,
            fixed,
            templates,
        })
    }
}

pub struct Registry {
    gateway: Arc<Gateway>,
    operations: Vec<Arc<OperationDescriptor>>,
    by_id: HashMap<&'static str, usize>,
    resources: Vec<Arc<ResourceDescriptor>>,
    fixed: HashMap<&'static str, usize>,
    templates: Vec<(UriTemplate, usize)>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn list_operations(&self) -> Vec<OperationSummary> {
        self.operations
            .iter()
            .map(|op| OperationSummary {
                name: op.id,
                description: op.description,
                input_schema: op.input_schema(),
            })
            .collect()
    }

    pub fn list_resources(&self) -> Vec<ResourceSummary> {
        self.resources
            .iter()
            .map(|resource| ResourceSummary {
                uri: resource.uri,
                templated: resource.templated,
                name: resource.name,
                description: resource.description,
                mime_type: resource.mime_type,
            })
            .collect()
    }

    pub async fn invoke(
        &self,
        id: &str,
        args: &Map<String, Value>,
        cancel: CancellationToken,
    ) -> InvocationResult {
        let started = Instant::now();
        let Some(op) = self.by_id.get(id).map(|index| self.operations[*index].clone()) else {
            return logged(
                id,
                started,
                InvocationResult::Failure(Failure::new(
                    FailureKind::NotFound,
                    format!("unknown operation '{id}'"),
                )),
            );
        };

        let bound = match op.bind(args) {
            Ok(bound) => bound,
            Err(failure) => return logged(id, started, InvocationResult::Failure(failure)),
        };

        let outcome = self
            .run_handler(op.handler.clone(), bound, cancel, op.failure_prefix)
            .await;
        let result = match outcome {
            Ok(payload) => InvocationResult::Success {
                payload,
                mime_type: op.mime_type.to_string(),
            },
            Err(failure) => InvocationResult::Failure(failure),
        };
        logged(id, started, result)
    }

    pub async fn resolve(&self, uri: &str, cancel: CancellationToken) -> InvocationResult {
        let started = Instant::now();
        let Some((resource, bindings)) = self.lookup(uri) else {
            return logged(
                uri,
                started,
                InvocationResult::Failure(Failure::new(
                    FailureKind::NotFound,
                    format!("no resource matches {uri}"),
                )),
            );
        };

        let bound = BoundArgs::new(
            bindings
                .into_iter()
                .map(|(name, value)| (name, ArgValue::Str(value)))
                .collect(),
        );
        let result = match self
            .run_handler(resource.handler.clone(), bound, cancel, None)
            .await
        {
            Ok(payload) => InvocationResult::Success {
                payload,
                mime_type: resource.mime_type.to_string(),
            },
            Err(failure) => InvocationResult::Failure(failure),
        };
        logged(uri, started, result)
    }

    /// Declared mime type of whichever resource `uri` resolves to.
    pub fn resource_mime_type(&self, uri: &str) -> Option<&'static str> {
        self.lookup(uri).map(|(resource, _)| resource.mime_type)
    }

    fn lookup(&self, uri: &str) -> Option<(Arc<ResourceDescriptor>, Vec<(String, String)>)> {
        if let Some(index) = self.fixed.get(uri) {
            return Some((self.resources[*index].clone(), Vec::new()));
        }
        self.templates.iter().find_map(|(template, index)| {
            template
                .matches(uri)
                .map(|bindings| (self.resources[*index].clone(), bindings))
        })
    }

    /// Runs the handler on its own task so a panic is contained. The task's
    /// token is a child of `cancel` and is cancelled if this future is dropped.
    async fn run_handler(
        &self,
        handler: Handler,
        args: BoundArgs,
        cancel: CancellationToken,
        failure_prefix: Option<&'static str>,
    ) -> Result<String, Failure> {
        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();
        let ctx = CallContext::new(self.gateway.clone(), token);
        let task = tokio::spawn(async move { handler(ctx, args).await });

        let failure = match task.await {
            Ok(Ok(payload)) => return Ok(payload),
            Ok(Err(err)) => {
                let message = match failure_prefix {
                    Some(prefix) => format!("{prefix}: {err}"),
                    None => err.to_string(),
                };
                Failure::new(err.kind(), message)
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler was aborted".to_string()
                };
                Failure::new(
                    FailureKind::HandlerError,
                    match failure_prefix {
                        Some(prefix) => format!("{prefix}: {message}"),
                        None => message,
                    },
                )
            }
        };
        Err(failure)
    }
}

fn logged(subject: &str, started: Instant, result: InvocationResult) -> InvocationResult {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        InvocationResult::Success { .. } => {
            tracing::info!(event = "dispatch", subject = %subject, ok = true, elapsed_ms);
        }
        InvocationResult::Failure(failure) => {
            tracing::warn!(
                event = "dispatch",
                subject = %subject,
                ok = false,
                kind = failure.kind.code(),
                elapsed_ms,
            );
        }
    }
    result
}
