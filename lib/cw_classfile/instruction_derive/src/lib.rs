// allowing panics since this is the standard way to show an
// error message from a proc-macro derive crate.
#![allow(clippy::panic)]

//! This crate introduces a proc macro derive to specifically derive
//! `cw_classfile::instrs::Instruction` implementation for JVM instructions,
//! from proc macro attributes.
//!
//! The JVM instruction set is large, so each variant of the instruction enum
//! carries its own opcode byte, its mnemonic, and the properties that
//! analysis algorithms need (for example `can_throw`, used when attaching
//! exception handler edges to control flow graph blocks).

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Fields, Ident, Lit, LitBool,
    LitInt, LitStr, Meta, MetaNameValue, NestedMeta, Variant,
};

/// The main JVM bytecode `Instruction` proc macro derive.
///
/// It derives implementation of `cw_classfile::instrs::Instruction` trait, using the
/// following attributes:
/// - `mnemonic` is the name printed when disassembling,
/// - `opcode` is the opcode byte (for `wide` forms, the opcode of the modified instruction),
/// - `can_throw` indicates if the instruction may raise an exception (default: `false`).
///
/// Variant fields must be unnamed and implement `Display`: they are the
/// operands returned by `operands()`.
///
/// # Example
///
/// ```rust
/// trait Instruction {
///     fn mnemonic(&self) -> &str;
///     fn opcode(&self) -> u8;
///     fn can_throw(&self) -> bool;
///     fn operands(&self) -> Vec<String>;
/// }
///
/// #[derive(instruction_derive::Instruction)]
/// pub enum SmallInstr {
///     #[instruction(mnemonic = "nop", opcode = 0x00)]
///     Nop,
///     #[instruction(mnemonic = "bipush", opcode = 0x10)]
///     Bipush(i8),
/// }
/// ```
#[proc_macro_derive(Instruction, attributes(instruction))]
pub fn instruction_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let gen = derive_instruction_all(&ast);
    gen.into()
}

fn derive_instruction_all(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let Data::Enum(data) = &ast.data else {
        panic!("#[derive(Instruction)] is only defined for enums")
    };

    let instruction_impl = derive_instruction_impl(name, data);

    quote! {
        #instruction_impl
    }
}

fn derive_instruction_impl(name: &Ident, data: &DataEnum) -> TokenStream2 {
    let mnemonic_matches = data
        .variants
        .iter()
        .map(|variant| mnemonic_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let opcode_matches = data
        .variants
        .iter()
        .map(|variant| opcode_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let canthrow_matches = data
        .variants
        .iter()
        .map(|variant| canthrow_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let operands_matches = data
        .variants
        .iter()
        .map(|variant| operands_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    quote! {
        impl Instruction for #name {
            fn mnemonic(&self) -> &str {
                match self {
                    #(#mnemonic_matches)*
                }
            }

            fn opcode(&self) -> u8 {
                match self {
                    #(#opcode_matches)*
                }
            }

            fn can_throw(&self) -> bool {
                match self {
                    #(#canthrow_matches)*
                }
            }

            fn operands(&self) -> Vec<String> {
                match self {
                    #(#operands_matches)*
                }
            }
        }
    }
}

fn mnemonic_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = anonymous_fields_pattern(variant);
    let mnemonic = get_instruction_string_value(&variant.attrs, "mnemonic");

    quote! {
        #name::#ident #fields => #mnemonic,
    }
}

fn opcode_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = anonymous_fields_pattern(variant);
    let opcode = get_instruction_int_value(&variant.attrs, "opcode");
    let value: u8 = opcode.base10_parse().expect("opcode must fit in a byte");
    let lit = LitInt::new(&format!("{value}u8"), opcode.span());

    quote! {
        #name::#ident #fields => #lit,
    }
}

fn canthrow_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = anonymous_fields_pattern(variant);
    let canthrow = get_instruction_bool_value(&variant.attrs, "can_throw");

    quote! {
        #name::#ident #fields => #canthrow,
    }
}

fn operands_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    match &variant.fields {
        Fields::Named(_) => panic!("#[derive(Instruction)] expects unnamed operands"),
        Fields::Unnamed(flds) => {
            let params: Vec<_> = flds
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, _)| Ident::new(&format!("op{i}"), Span::call_site()))
                .collect();
            quote! {
                #name::#ident (#(#params),*) => vec![#(#params.to_string()),*],
            }
        }
        Fields::Unit => quote! {
            #name::#ident => Vec::new(),
        },
    }
}

fn anonymous_fields_pattern(variant: &Variant) -> TokenStream2 {
    match &variant.fields {
        Fields::Named(_) => quote! { { .. } },
        Fields::Unnamed(flds) => {
            let voids: Vec<TokenStream2> = flds.unnamed.iter().map(|_| quote! { _ }).collect();
            quote! {(#(#voids),*)}
        }
        Fields::Unit => quote! {},
    }
}

fn get_instruction_values(attr: &Attribute) -> Vec<MetaNameValue> {
    if !attr.path.is_ident("instruction") {
        return Vec::new();
    }

    match attr.parse_meta() {
        Ok(Meta::NameValue(v)) => vec![v],
        Ok(Meta::List(meta)) => meta
            .nested
            .into_iter()
            .map(|nested| match nested {
                // a bare flag such as `can_throw` is read as `can_throw = true`
                NestedMeta::Meta(Meta::Path(path)) => {
                    let span = path
                        .segments
                        .first()
                        .expect("path first segment")
                        .ident
                        .span();
                    MetaNameValue {
                        path,
                        eq_token: syn::token::Eq { spans: [span] },
                        lit: Lit::Bool(LitBool { value: true, span }),
                    }
                }
                NestedMeta::Meta(Meta::NameValue(n)) => n,
                _ => panic!("expected #[instruction(...)]"),
            })
            .collect(),
        _ => panic!("expected #[instruction(...)]"),
    }
}

fn find_instruction_value(attrs: &[Attribute], name: &str) -> Option<Lit> {
    attrs
        .iter()
        .flat_map(get_instruction_values)
        .find(|name_value| name_value.path.is_ident(name))
        .map(|name_value| name_value.lit)
}

fn get_instruction_string_value(attrs: &[Attribute], name: &str) -> LitStr {
    match find_instruction_value(attrs, name) {
        Some(Lit::Str(s)) => s,
        Some(_) => panic!("expected string for '{name}' value"),
        None => panic!("missing '{name}' attribute"),
    }
}

fn get_instruction_int_value(attrs: &[Attribute], name: &str) -> LitInt {
    match find_instruction_value(attrs, name) {
        Some(Lit::Int(i)) => i,
        Some(_) => panic!("expected integer for '{name}' value"),
        None => panic!("missing '{name}' attribute"),
    }
}

fn get_instruction_bool_value(attrs: &[Attribute], name: &str) -> LitBool {
    match find_instruction_value(attrs, name) {
        Some(Lit::Bool(b)) => b,
        Some(_) => panic!("expected bool for '{name}' value"),
        None => LitBool {
            value: false,
            span: Span::call_site(),
        },
    }
}
