//! The host binding registry.
//!
//! Bindings are explicit descriptors built at registration time — name,
//! qualifying context, signature, and the invocable — and dispatched
//! through one trampoline in the VM. A whole host object registers as a
//! synthetic opaque struct whose members are its bound methods.

use crate::decl::parse_decl;
use cobble_types::{
    FunctionSig, Member, MemberKind, StructDef, TargetDesc, Type, TypeStore,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Registration-time errors.
#[derive(Debug, Error)]
pub enum InteropError {
    #[error("invalid declaration '{decl}': {reason}")]
    Parse { decl: String, reason: String },
    #[error("unknown type '{0}' in declaration")]
    UnknownType(String),
    #[error("duplicate registration of '{0}'")]
    Duplicate(String),
}

/// An error raised by a host callable; becomes a fatal runtime fault.
#[derive(Debug, Error)]
#[error("host error: {0}")]
pub struct HostError(pub String);

/// A host-side value crossing the interop boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Void,
    Int(i64),
    Uint(u64),
    Float(f64),
    Addr(u64),
    Str(String),
}

/// A host callable. Receives arguments already decoded per the binding's
/// declared parameter types.
pub type NativeFn = Box<dyn Fn(&[NativeValue]) -> Result<NativeValue, HostError>>;

/// One registered host callable.
pub struct NativeBinding {
    pub name: String,
    pub qualifier: Option<String>,
    pub sig: Arc<FunctionSig>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBinding")
            .field("name", &self.name)
            .field("qualifier", &self.qualifier)
            .finish_non_exhaustive()
    }
}

/// A registered host object: an opaque synthetic struct type whose members
/// are the object's bound methods.
#[derive(Debug, Clone)]
pub struct HostObject {
    pub name: String,
    pub ty: Arc<Type>,
}

/// All host registrations for one engine.
///
/// Built before compilation; the emitter reads the declarations, the VM
/// dispatches `CallHost` through the binding indices.
pub struct HostRegistry {
    store: TypeStore,
    bindings: Vec<NativeBinding>,
    objects: Vec<HostObject>,
}

impl HostRegistry {
    /// Create a registry for the given target.
    pub fn new(target: TargetDesc) -> Self {
        Self {
            store: TypeStore::new(target),
            bindings: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Register a free function from a declaration string and a callable.
    /// Returns the binding index.
    pub fn register(&mut self, decl: &str, func: NativeFn) -> Result<u32, InteropError> {
        let (name, sig) = parse_decl(&self.store, decl)?;
        if self.find_clash(&name, None, &sig) {
            return Err(InteropError::Duplicate(name));
        }
        let idx = self.bindings.len() as u32;
        self.bindings.push(NativeBinding {
            name,
            qualifier: None,
            sig,
            func,
        });
        Ok(idx)
    }

    /// Register a whole host object: every `(declaration, callable)` pair
    /// becomes an instance-method binding qualified by the object's name,
    /// and the object itself becomes a synthetic opaque struct type.
    pub fn register_object(
        &mut self,
        name: &str,
        methods: Vec<(&str, NativeFn)>,
    ) -> Result<(), InteropError> {
        if self.objects.iter().any(|o| o.name == name) {
            return Err(InteropError::Duplicate(name.to_string()));
        }
        let mut members = Vec::new();
        for (decl, func) in methods {
            let (method_name, sig) = parse_decl(&self.store, decl)?;
            let sig = Arc::new(FunctionSig {
                ret: sig.ret.clone(),
                params: sig.params.clone(),
                is_instance: true,
                qualifier: Some(name.to_string()),
            });
            if self.find_clash(&method_name, Some(name), &sig) {
                return Err(InteropError::Duplicate(format!("{name}.{method_name}")));
            }
            members.push(Member {
                name: method_name.clone(),
                kind: MemberKind::Method { sig: sig.clone() },
            });
            self.bindings.push(NativeBinding {
                name: method_name,
                qualifier: Some(name.to_string()),
                sig,
                func,
            });
        }
        let ty = Arc::new(Type::Struct(Arc::new(StructDef {
            name: name.to_string(),
            members,
        })));
        self.objects.push(HostObject {
            name: name.to_string(),
            ty,
        });
        Ok(())
    }

    fn find_clash(&self, name: &str, qualifier: Option<&str>, sig: &FunctionSig) -> bool {
        self.bindings.iter().any(|b| {
            b.name == name
                && b.qualifier.as_deref() == qualifier
                && b.sig.params.len() == sig.params.len()
                && b.sig
                    .params
                    .iter()
                    .zip(sig.params.iter())
                    .all(|(x, y)| x.ty == y.ty)
        })
    }

    pub fn bindings(&self) -> &[NativeBinding] {
        &self.bindings
    }

    pub fn get(&self, idx: u32) -> Option<&NativeBinding> {
        self.bindings.get(idx as usize)
    }

    pub fn objects(&self) -> &[HostObject] {
        &self.objects
    }
}

impl fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRegistry")
            .field("bindings", &self.bindings)
            .field("objects", &self.objects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HostRegistry {
        HostRegistry::new(TargetDesc::lp64())
    }

    #[test]
    fn test_register_function() {
        let mut reg = registry();
        let idx = reg
            .register("int add(int a, int b)", Box::new(|args| {
                let (NativeValue::Int(a), NativeValue::Int(b)) = (&args[0], &args[1]) else {
                    return Err(HostError("bad args".into()));
                };
                Ok(NativeValue::Int(a + b))
            }))
            .unwrap();
        assert_eq!(idx, 0);
        let b = reg.get(0).unwrap();
        assert_eq!(b.name, "add");
        assert_eq!(b.sig.params.len(), 2);
        let out = (b.func)(&[NativeValue::Int(3), NativeValue::Int(4)]).unwrap();
        assert_eq!(out, NativeValue::Int(7));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut reg = registry();
        reg.register("void f(int x)", Box::new(|_| Ok(NativeValue::Void)))
            .unwrap();
        // Same name and parameter types → duplicate.
        let err = reg.register("int f(int y)", Box::new(|_| Ok(NativeValue::Int(0))));
        assert!(matches!(err, Err(InteropError::Duplicate(_))));
        // Different parameter list → a distinct overload.
        reg.register("void f(double x)", Box::new(|_| Ok(NativeValue::Void)))
            .unwrap();
    }

    #[test]
    fn test_register_object_builds_synthetic_struct() {
        let mut reg = registry();
        reg.register_object(
            "console",
            vec![
                ("void log(const char* msg)", Box::new(|_: &[NativeValue]| Ok(NativeValue::Void)) as NativeFn),
                ("int lines()", Box::new(|_: &[NativeValue]| Ok(NativeValue::Int(0))) as NativeFn),
            ],
        )
        .unwrap();

        let obj = &reg.objects()[0];
        assert_eq!(obj.name, "console");
        let Type::Struct(def) = &*obj.ty else {
            panic!("expected a struct type");
        };
        assert_eq!(def.members.len(), 2);
        assert!(def.member("log").is_some());
        // The object occupies one opaque slot.
        assert_eq!(obj.ty.slot_count(), 1);

        // Methods registered as qualified instance bindings.
        let log = &reg.bindings()[0];
        assert_eq!(log.qualifier.as_deref(), Some("console"));
        assert!(log.sig.is_instance);
    }

    #[test]
    fn test_duplicate_object_rejected() {
        let mut reg = registry();
        reg.register_object("obj", vec![]).unwrap();
        assert!(matches!(
            reg.register_object("obj", vec![]),
            Err(InteropError::Duplicate(_))
        ));
    }
}
