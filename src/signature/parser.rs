use crate::{
    signature::{ClassSegment, ClassType, FormalTypeParameter, Signature, TypeArg, TypeSymbol},
    Error::RecursionLimit,
    Result,
};

/// Maximum nesting of type arguments and array element types
const MAX_RECURSION_DEPTH: usize = 50;

/// Recursive-descent parser for the generic signature grammar of JVMS §4.7.9.1.
///
/// # Example
///
/// ```rust,no_run
/// use classweave::signature::SignatureParser;
///
/// let sig = SignatureParser::new("<T:Ljava/lang/Object;>(TT;)Ljava/util/List<TT;>;")
///     .parse_signature()
///     .unwrap();
/// assert_eq!(sig.formal_type_parameters.len(), 1);
/// assert_eq!(sig.parameters.len(), 1);
/// ```
///
/// A parser instance consumes its input once; create a new one per signature.
pub struct SignatureParser<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// Create a parser over `input`.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        SignatureParser {
            input,
            position: 0,
            depth: 0,
        }
    }

    /// Parse a class or method signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for invalid input and [`crate::Error::RecursionLimit`]
    /// if types nest too deeply.
    pub fn parse_signature(mut self) -> Result<Signature> {
        let mut sig = Signature::default();
        if self.peek() == Some(b'<') {
            self.position += 1;
            while self.peek() != Some(b'>') {
                sig.formal_type_parameters.push(self.parse_formal()?);
            }
            self.position += 1;
        }

        if self.peek() == Some(b'(') {
            self.position += 1;
            while self.peek() != Some(b')') {
                if self.peek().is_none() {
                    return Err(malformed_error!("Unterminated parameter list - {}", self.input));
                }
                sig.parameters.push(self.parse_type()?);
            }
            self.position += 1;
            sig.return_type = Some(self.parse_type()?);
            while self.peek() == Some(b'^') {
                self.position += 1;
                sig.exceptions.push(self.parse_reference_type()?);
            }
        } else {
            sig.superclass = Some(self.parse_reference_type()?);
            while self.peek().is_some() {
                sig.interfaces.push(self.parse_reference_type()?);
            }
        }

        self.expect_end()?;
        Ok(sig)
    }

    /// Parse a field or type signature.
    ///
    /// # Errors
    /// See [`SignatureParser::parse_signature`].
    pub fn parse_type_signature(mut self) -> Result<TypeSymbol> {
        let ty = self.parse_type()?;
        self.expect_end()?;
        Ok(ty)
    }

    fn expect_end(&self) -> Result<()> {
        if self.position != self.input.len() {
            return Err(malformed_error!(
                "Trailing characters at {} - {}",
                self.position,
                self.input
            ));
        }
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    fn next(&mut self) -> Result<u8> {
        let byte = self
            .peek()
            .ok_or_else(|| malformed_error!("Unexpected end of signature - {}", self.input))?;
        self.position += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let found = self.next()?;
        if found != expected {
            return Err(malformed_error!(
                "Expected '{}' at {} but found '{}' - {}",
                expected as char,
                self.position - 1,
                found as char,
                self.input
            ));
        }
        Ok(())
    }

    /// Read an identifier up to one of `stops`, leaving the stop character unread.
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str> {
        let start = self.position;
        while let Some(byte) = self.peek() {
            if stops.contains(&byte) {
                let name = &self.input[start..self.position];
                if name.is_empty() {
                    return Err(malformed_error!("Empty identifier at {} - {}", start, self.input));
                }
                return Ok(name);
            }
            self.position += 1;
        }
        Err(malformed_error!("Unterminated identifier at {} - {}", start, self.input))
    }

    fn parse_formal(&mut self) -> Result<FormalTypeParameter> {
        let name = self.identifier(b":")?.to_string();
        self.expect(b':')?;
        let class_bound = match self.peek() {
            Some(b'L' | b'T' | b'[') => Some(self.parse_reference_type()?),
            _ => None,
        };
        let mut interface_bounds = Vec::new();
        while self.peek() == Some(b':') {
            self.position += 1;
            interface_bounds.push(self.parse_reference_type()?);
        }
        Ok(FormalTypeParameter {
            name,
            class_bound,
            interface_bounds,
        })
    }

    fn parse_reference_type(&mut self) -> Result<TypeSymbol> {
        match self.peek() {
            Some(b'L' | b'T' | b'[') => self.parse_type(),
            _ => Err(malformed_error!(
                "Expected a reference type at {} - {}",
                self.position,
                self.input
            )),
        }
    }

    fn parse_type(&mut self) -> Result<TypeSymbol> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }
        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeSymbol> {
        match self.next()? {
            descriptor @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
                Ok(TypeSymbol::Base {
                    descriptor: descriptor as char,
                    dims: 0,
                })
            }
            b'[' => {
                let element = self.parse_type()?;
                let dims = element
                    .dims()
                    .checked_add(1)
                    .ok_or_else(|| malformed_error!("Too many array dimensions - {}", self.input))?;
                Ok(element.with_dims(dims))
            }
            b'T' => {
                let name = self.identifier(b";")?.to_string();
                self.position += 1;
                Ok(TypeSymbol::Variable { name, dims: 0 })
            }
            b'L' => self.parse_class_type(),
            other => Err(malformed_error!(
                "Invalid type character '{}' at {} - {}",
                other as char,
                self.position - 1,
                self.input
            )),
        }
    }

    fn parse_class_type(&mut self) -> Result<TypeSymbol> {
        let mut segments = Vec::new();
        loop {
            let name = self.identifier(b"<;.")?.to_string();
            let mut args = Vec::new();
            if self.peek() == Some(b'<') {
                self.position += 1;
                while self.peek() != Some(b'>') {
                    args.push(self.parse_type_arg()?);
                }
                self.position += 1;
                if args.is_empty() {
                    return Err(malformed_error!("Empty type argument list - {}", self.input));
                }
            }
            segments.push(ClassSegment { name, args });

            match self.next()? {
                b';' => break,
                b'.' => {}
                other => {
                    return Err(malformed_error!(
                        "Unexpected '{}' after class type - {}",
                        other as char,
                        self.input
                    ))
                }
            }
        }
        Ok(TypeSymbol::Class(ClassType { segments, dims: 0 }))
    }

    fn parse_type_arg(&mut self) -> Result<TypeArg> {
        match self.peek() {
            Some(b'*') => {
                self.position += 1;
                Ok(TypeArg::Unbounded)
            }
            Some(b'+') => {
                self.position += 1;
                Ok(TypeArg::Extends(self.parse_reference_type()?))
            }
            Some(b'-') => {
                self.position += 1;
                Ok(TypeArg::Super(self.parse_reference_type()?))
            }
            Some(_) => Ok(TypeArg::Exact(self.parse_reference_type()?)),
            None => Err(malformed_error!("Unterminated type arguments - {}", self.input)),
        }
    }
}
