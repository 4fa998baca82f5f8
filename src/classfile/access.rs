//! Access flags for classes, fields and methods.
//!
//! The JVM reuses several bit positions with different meanings depending on where the flags
//! appear (`ACC_SUPER` and `ACC_SYNCHRONIZED`, `ACC_VOLATILE` and `ACC_BRIDGE`, `ACC_TRANSIENT`
//! and `ACC_VARARGS`). Both names are provided as aliases of the same bit.

use bitflags::bitflags;

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    /// Access and property flags of a class, field or method
    pub struct AccessFlags : u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by invokespecial (classes)
        const SUPER = 0x0020;
        /// Invocation is wrapped by a monitor use (methods)
        const SYNCHRONIZED = 0x0020;
        /// Cannot be cached (fields)
        const VOLATILE = 0x0040;
        /// A bridge method generated by the compiler
        const BRIDGE = 0x0040;
        /// Not written or read by a persistent object manager (fields)
        const TRANSIENT = 0x0080;
        /// Declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Implemented in a language other than Java
        const NATIVE = 0x0100;
        /// Is an interface, not a class
        const INTERFACE = 0x0200;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Floating-point mode is FP-strict
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class or enum constant
        const ENUM = 0x4000;
        /// Is a module, not a class or interface
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    /// Returns `true` if the `STATIC` bit is set.
    #[must_use]
    pub fn is_static(self) -> bool {
        self.contains(AccessFlags::STATIC)
    }

    /// Returns `true` if the `ABSTRACT` bit is set.
    #[must_use]
    pub fn is_abstract(self) -> bool {
        self.contains(AccessFlags::ABSTRACT)
    }

    /// Returns `true` if the `INTERFACE` bit is set.
    #[must_use]
    pub fn is_interface(self) -> bool {
        self.contains(AccessFlags::INTERFACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_bits() {
        assert_eq!(AccessFlags::SUPER.bits(), AccessFlags::SYNCHRONIZED.bits());
        let flags = AccessFlags::from_bits_retain(0x0601);
        assert!(flags.is_interface());
        assert!(flags.is_abstract());
        assert!(!flags.is_static());
    }
}
