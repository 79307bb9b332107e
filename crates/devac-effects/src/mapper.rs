//! FunctionCall promotion.
//!
//! For each FunctionCall effect the callee name and qualified name are
//! matched against catalog patterns; first match wins in the order
//! store → retrieve → external → request handler. The matched call is
//! replaced by the richer variant with its base fields copied verbatim.
//! Everything else passes through unchanged.

use crate::catalog::{GroupMapping, PackageEffectMappings};
use devac_core::model::{Effect, SendType, StoreType};
use tracing::trace;

/// Apply a merged catalog to a batch of effects.
pub fn map_effects(effects: Vec<Effect>, mappings: &PackageEffectMappings) -> Vec<Effect> {
    if mappings.is_empty() {
        return effects;
    }
    effects
        .into_iter()
        .map(|effect| map_effect(effect, mappings))
        .collect()
}

fn map_effect(effect: Effect, mappings: &PackageEffectMappings) -> Effect {
    let Effect::FunctionCall {
        base,
        callee_name,
        callee_qualified_name,
        is_method_call,
        is_async,
        is_constructor,
        argument_count,
        is_external,
        external_module,
    } = effect
    else {
        return effect;
    };

    let group = group_for(&mappings.groups, &callee_name, &callee_qualified_name);
    let tag_group = |mut base: devac_core::model::EffectBase| {
        if let Some(name) = group {
            base.properties
                .insert("group".to_string(), serde_json::Value::from(name));
        }
        base
    };

    for m in &mappings.store_operations {
        if matches(&m.pattern, m.exact, &callee_name, &callee_qualified_name) {
            trace!(callee = %callee_qualified_name, pattern = %m.pattern, "mapped to Store");
            return Effect::Store {
                base: tag_group(base),
                store_type: StoreType::parse_lenient(&m.store_type),
                operation: m.operation.clone(),
                target_resource: m
                    .target_resource
                    .clone()
                    .unwrap_or_else(|| callee_qualified_name.clone()),
                provider: m.provider.clone(),
            };
        }
    }

    for m in &mappings.retrieve_operations {
        if matches(&m.pattern, m.exact, &callee_name, &callee_qualified_name) {
            trace!(callee = %callee_qualified_name, pattern = %m.pattern, "mapped to Retrieve");
            return Effect::Retrieve {
                base: tag_group(base),
                retrieve_type: StoreType::parse_lenient(&m.retrieve_type),
                operation: m.operation.clone(),
                source_resource: m
                    .source_resource
                    .clone()
                    .unwrap_or_else(|| callee_qualified_name.clone()),
                provider: m.provider.clone(),
            };
        }
    }

    for m in &mappings.external_calls {
        if matches(&m.pattern, m.exact, &callee_name, &callee_qualified_name) {
            trace!(callee = %callee_qualified_name, pattern = %m.pattern, "mapped to Send");
            return Effect::Send {
                base: tag_group(base),
                send_type: SendType::parse_lenient(&m.send_type),
                method: Some(callee_name.clone()),
                target: m
                    .target
                    .clone()
                    .unwrap_or_else(|| callee_qualified_name.clone()),
                is_third_party: m.is_third_party,
                service_name: m.service_name.clone(),
            };
        }
    }

    for m in &mappings.request_handlers {
        if matches(&m.pattern, m.exact, &callee_name, &callee_qualified_name) {
            trace!(callee = %callee_qualified_name, pattern = %m.pattern, "mapped to Request");
            return Effect::Request {
                base: tag_group(base),
                method: m.method.clone(),
                route_pattern: m
                    .route_pattern
                    .clone()
                    .unwrap_or_else(|| callee_qualified_name.clone()),
                framework: m.framework.clone(),
            };
        }
    }

    // No match: the call passes through untouched.
    Effect::FunctionCall {
        base,
        callee_name,
        callee_qualified_name,
        is_method_call,
        is_async,
        is_constructor,
        argument_count,
        is_external,
        external_module,
    }
}

fn matches(pattern: &str, exact: bool, callee_name: &str, callee_qualified_name: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if exact {
        callee_name == pattern || callee_qualified_name == pattern
    } else {
        callee_name.contains(pattern) || callee_qualified_name.contains(pattern)
    }
}

fn group_for<'a>(
    groups: &'a [GroupMapping],
    callee_name: &str,
    callee_qualified_name: &str,
) -> Option<&'a str> {
    groups
        .iter()
        .find(|g| {
            g.patterns
                .iter()
                .any(|p| matches(p, false, callee_name, callee_qualified_name))
        })
        .map(|g| g.name.as_str())
}
