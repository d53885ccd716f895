//! Constructor selection and argument resolution.

use crate::definition::{Constructor, MergedDefinition};
use crate::error::{BeanError, BeanResult};
use crate::value::{Args, Param, ValueSpec};

use super::BeanFactory;

/// Effective spec of the parameter at `index`: an explicit constructor
/// argument on the definition overrides the parameter's own spec.
fn effective_spec<'a>(definition: &'a MergedDefinition, index: usize, param: &'a Param) -> &'a ValueSpec {
    definition.constructor_args.get(&index).unwrap_or(&param.spec)
}

/// Number of parameters the explicit constructor arguments require.
fn explicit_arity(definition: &MergedDefinition) -> usize {
    definition.constructor_args.keys().next_back().map_or(0, |last| last + 1)
}

/// Picks the constructor to use for `name`
///
/// A single candidate is used directly. Otherwise every candidate whose
/// parameters all resolve (dry run, nothing is created) is eligible and the
/// eligible one with the most parameters wins; an equal-count tie is
/// ambiguous. If nothing is eligible, the failure of the largest candidate is
/// reported.
pub(crate) fn select_constructor<'c>(
    factory: &BeanFactory,
    name: &str,
    definition: &MergedDefinition,
    candidates: &'c [Constructor],
) -> BeanResult<&'c Constructor> {
    match candidates {
        [] => return Err(BeanError::invalid(name, "no constructors declared")),
        [only] => return Ok(only),
        _ => {}
    }

    let required = explicit_arity(definition);
    let mut eligible: Vec<&Constructor> = Vec::new();
    let mut largest_failure: Option<(usize, BeanError)> = None;

    for candidate in candidates {
        let outcome = if candidate.arity() < required {
            Err(BeanError::invalid(
                name,
                format!("{} explicit constructor arguments but only {} parameters", required, candidate.arity()),
            ))
        } else {
            check_params(factory, name, definition, candidate.params())
        };
        match outcome {
            Ok(()) => eligible.push(candidate),
            Err(err) => {
                let replace = largest_failure.as_ref().map_or(true, |(arity, _)| candidate.arity() > *arity);
                if replace {
                    largest_failure = Some((candidate.arity(), err));
                }
            }
        }
    }

    let Some(best_arity) = eligible.iter().map(|ctor| ctor.arity()).max() else {
        return Err(largest_failure
            .map(|(_, err)| err)
            .unwrap_or_else(|| BeanError::invalid(name, "no usable constructor")));
    };

    let best: Vec<&Constructor> = eligible.into_iter().filter(|ctor| ctor.arity() == best_arity).collect();
    if best.len() > 1 {
        return Err(BeanError::AmbiguousConstructor { name: name.to_string(), arity: best_arity, tied: best.len() });
    }
    tracing::trace!(bean = name, arity = best_arity, "selected constructor");
    Ok(best[0])
}

/// Dry run: checks that every parameter would resolve without creating anything.
pub(crate) fn check_params(factory: &BeanFactory, name: &str, definition: &MergedDefinition, params: &[Param]) -> BeanResult<()> {
    params
        .iter()
        .enumerate()
        .try_for_each(|(index, param)| factory.check_value(name, effective_spec(definition, index, param)))
}

/// Resolves every parameter, creating referenced beans as needed.
pub(crate) fn resolve_args(factory: &BeanFactory, name: &str, definition: &MergedDefinition, params: &[Param]) -> BeanResult<Args> {
    let values = params
        .iter()
        .enumerate()
        .map(|(index, param)| factory.resolve_value(name, effective_spec(definition, index, param)))
        .collect::<BeanResult<Vec<_>>>()?;
    Ok(Args::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BeanDefinition;

    struct Engine;
    struct Car {
        engines: usize,
    }

    fn factory_with(definitions: Vec<(&str, BeanDefinition)>) -> BeanFactory {
        let factory = BeanFactory::new();
        for (name, definition) in definitions {
            factory.register_definition(name, definition).unwrap();
        }
        factory
    }

    #[test]
    fn most_resolvable_parameters_win() {
        let car = BeanDefinition::of::<Car>()
            .constructor(vec![], |_| Ok(Car { engines: 0 }))
            .constructor(vec![Param::autowire::<Engine>("engine")], |_| Ok(Car { engines: 1 }))
            .constructor(
                vec![Param::autowire::<Engine>("engine"), Param::autowire::<String>("missing")],
                |_| Ok(Car { engines: 2 }),
            );
        let factory = factory_with(vec![
            ("engine", BeanDefinition::of::<Engine>().constructor(vec![], |_| Ok(Engine))),
            ("car", car),
        ]);

        let car = factory.get_bean("car").unwrap().downcast::<Car>().unwrap();
        assert_eq!(car.engines, 1);
    }

    #[test]
    fn equal_arity_tie_is_ambiguous() {
        let car = BeanDefinition::of::<Car>()
            .constructor(vec![Param::autowire::<Engine>("engine")], |_| Ok(Car { engines: 1 }))
            .constructor(vec![Param::literal(3usize)], |args| Ok(Car { engines: args.value::<usize>(0)? }));
        let factory = factory_with(vec![
            ("engine", BeanDefinition::of::<Engine>().constructor(vec![], |_| Ok(Engine))),
            ("car", car),
        ]);

        match factory.get_bean("car") {
            Err(BeanError::AmbiguousConstructor { arity, tied, .. }) => assert_eq!((arity, tied), (1, 2)),
            other => panic!("expected ambiguity, got {:?}", other.map(|bean| bean.name().to_string())),
        }
    }

    #[test]
    fn failure_of_the_largest_constructor_is_reported() {
        let car = BeanDefinition::of::<Car>()
            .constructor(vec![Param::reference("nitro")], |_| Ok(Car { engines: 1 }))
            .constructor(
                vec![Param::autowire::<Engine>("engine"), Param::reference("turbo")],
                |_| Ok(Car { engines: 2 }),
            );
        let factory = factory_with(vec![
            ("engine", BeanDefinition::of::<Engine>().constructor(vec![], |_| Ok(Engine))),
            ("car", car),
        ]);

        assert!(matches!(factory.get_bean("car"), Err(BeanError::NoSuchDefinition(name)) if name == "turbo"));
    }

    #[test]
    fn explicit_arguments_override_parameter_specs() {
        let car = BeanDefinition::of::<Car>()
            .constructor(vec![Param::literal(1usize)], |args| Ok(Car { engines: args.value::<usize>(0)? }))
            .constructor_arg(0, ValueSpec::literal(8usize));
        let factory = factory_with(vec![("car", car)]);

        assert_eq!(factory.get_bean("car").unwrap().downcast::<Car>().unwrap().engines, 8);
    }
}
