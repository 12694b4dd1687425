//! Walkthrough of the reflection core: a shared primitive registry, one
//! registered application type, and dynamic inspection and invocation of
//! values whose static types are erased.

use std::sync::Arc;

use mirra_reflect::{basic_registry, AnyArg, Registry, Result};

#[derive(Clone, Debug)]
struct Player {
    name: String,
    health: i32,
}

fn register_player(reg: &mut Registry) -> Result<()> {
    reg.register_type::<Player>("Player", &[])?
        .add_constructor(|name: String| Player { name, health: 100 })
        .add_constructor(|name: String, health: i32| Player { name, health })
        .add_method("heal", |p: &mut Player, amount: i32| {
            p.health = (p.health + amount).min(100);
            p.health
        })
        .add_method("damage", |p: &mut Player, amount: i32| {
            p.health = (p.health - amount).max(0);
            p.health
        })
        .add_method("describe", |p: &mut Player| {
            format!("{} ({} hp)", p.name, p.health)
        })
        .add_field("name", |p: &mut Player| &mut p.name)
        .add_field("health", |p: &mut Player| &mut p.health);
    Ok(())
}

fn main() -> Result<()> {
    // Primitives live in a shared base layer; application types go into a
    // context layered on top of it.
    let base = Arc::new(basic_registry()?);
    let mut reg = Registry::with_base(base);
    register_player(&mut reg)?;
    reg.register_function("greet", |name: String| format!("hello, {name}"));

    let ty = reg.get_type("Player")?;

    println!("type `{}`:", ty.name());
    for (name, func) in ty.functions() {
        println!("  fn {name}/{}", func.arity());
    }
    for (name, field) in ty.fields() {
        println!("  field {name}: {}", field.field_ident());
    }

    // Construct dynamically and call methods on the erased value.
    let mut player = reg.construct(
        "Player",
        &[AnyArg::new(String::from("iris")), AnyArg::new(130i32)],
    )?;

    let heal = ty.function("heal")?;
    heal.call(
        &reg,
        &[AnyArg::from_value_mut(&mut player), AnyArg::new(15i32)],
    )?;

    let described = ty
        .function("describe")?
        .call(&reg, &[AnyArg::from_value_mut(&mut player)])?;
    println!("{}", described.as_ref::<String>()?);

    // Members are just as reachable without static knowledge.
    let owner = AnyArg::from_value_mut(&mut player);
    let health_field = ty.field("health")?;
    health_field.set_value(&reg, &owner, &AnyArg::new(50i32))?;
    let health = health_field.get_value(&owner)?;
    println!("health is now {}", health.as_ref::<i32>()?);

    let greeting = reg.call("greet", &[AnyArg::new(String::from("mirra"))])?;
    println!("{}", greeting.as_ref::<String>()?);

    Ok(())
}
